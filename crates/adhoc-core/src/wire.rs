//! Wire payloads exchanged through `PeerTransport::send`

use serde::{Deserialize, Serialize};

use crate::Result;

/// Data frames broadcast to the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WirePayload {
    /// Plain chat message
    Text { body: String },
}

impl WirePayload {
    pub fn text(body: impl Into<String>) -> Self {
        WirePayload::Text { body: body.into() }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}
