//! Remote peers known to the session

use serde::{Deserialize, Serialize};

use crate::types::{PeerId, Timestamp};

/// Connection state reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerState {
    NotConnected,
    Connecting,
    Connected,
}

impl core::fmt::Display for PeerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PeerState::NotConnected => write!(f, "not connected"),
            PeerState::Connecting => write!(f, "connecting"),
            PeerState::Connected => write!(f, "connected"),
        }
    }
}

/// A remote participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub display_name: String,
    pub state: PeerState,
    /// Last time the transport reported a state change
    pub last_changed: Timestamp,
}

impl Peer {
    pub fn new(id: PeerId, display_name: impl Into<String>, state: PeerState) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            state,
            last_changed: Timestamp::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == PeerState::Connected
    }
}
