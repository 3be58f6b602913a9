//! Transport abstraction for the adhoc chat session
//!
//! The session never talks to a radio or socket itself. A `PeerTransport`
//! advertises the local peer in a room, moves data and resources between
//! peers and reports everything that happens asynchronously as
//! `TransportEvent`s on the event channel it was handed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::identity::LocalIdentity;
use crate::peer::PeerState;
use crate::transcript::ResourceName;
use crate::types::PeerId;
use crate::Result;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Peer-to-peer transport used by a session
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Make the local peer discoverable in the identity's room and accept
    /// invitations
    async fn advertise(&self, identity: &LocalIdentity) -> Result<()>;

    /// Reliable send to the given peers
    async fn send(&self, data: Vec<u8>, peers: &[PeerId]) -> Result<()>;

    /// Start an asynchronous resource transfer to the given peers
    ///
    /// Progress and completion are reported per recipient through
    /// `TransportEvent::TransferProgress`, `TransferFinished` and
    /// `TransferFailed`.
    async fn send_resource(
        &self,
        resource_name: &ResourceName,
        path: &Path,
        peers: &[PeerId],
    ) -> Result<TransferHandle>;

    /// Stop advertising and drop all connections
    async fn stop(&self) -> Result<()>;
}

/// Handle for an outgoing transfer started by `send_resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHandle {
    pub resource_name: ResourceName,
    /// Peers the transport actually started sending to
    pub recipients: Vec<PeerId>,
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Callbacks from the transport, in no particular order across peers
///
/// For one transfer and one peer, progress events are ordered and the
/// finished or failed event is the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportEvent {
    /// A peer's connection state changed
    PeerStateChanged {
        peer_id: PeerId,
        display_name: String,
        state: PeerState,
    },
    /// Data arrived from a peer
    DataReceived { from: PeerId, data: Vec<u8> },
    /// A peer started sending us a resource
    TransferStarted {
        resource_name: ResourceName,
        from: PeerId,
    },
    /// Transfer progress with `peer_id`, in either direction
    TransferProgress {
        resource_name: ResourceName,
        peer_id: PeerId,
        fraction: f64,
    },
    /// Transfer with `peer_id` completed; for incoming transfers `location`
    /// is where the transport left the received file
    TransferFinished {
        resource_name: ResourceName,
        peer_id: PeerId,
        location: PathBuf,
    },
    /// Transfer with `peer_id` aborted
    TransferFailed {
        resource_name: ResourceName,
        peer_id: PeerId,
        reason: String,
    },
}

impl TransportEvent {
    /// Peer the event concerns
    pub fn peer_id(&self) -> PeerId {
        match self {
            TransportEvent::PeerStateChanged { peer_id, .. }
            | TransportEvent::TransferProgress { peer_id, .. }
            | TransportEvent::TransferFinished { peer_id, .. }
            | TransportEvent::TransferFailed { peer_id, .. } => *peer_id,
            TransportEvent::DataReceived { from, .. }
            | TransportEvent::TransferStarted { from, .. } => *from,
        }
    }
}
