//! Adhoc Chat Core
//!
//! Data model for a proximity group chat: the transcript log that records
//! every chat event in order, peers and identities, and the transport seam
//! the session runtime drives. Nothing in this crate spawns tasks; the
//! `adhoc-runtime` crate owns the single task that mutates the log.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod identity;
pub mod peer;
pub mod transcript;
pub mod transcript_log;
pub mod transport;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, SessionStats};
pub use config::{ChannelConfig, SessionConfig};
pub use errors::{
    AdhocError, AdhocResult, IdentityError, IdentityField, Result, TranscriptError,
    TransportError,
};
pub use identity::{DisplayName, LocalIdentity, RoomName};
pub use peer::{Peer, PeerState};
pub use transcript::{Direction, ResourceName, Transcript, TranscriptKind};
pub use transcript_log::{LogPosition, TranscriptLog};
pub use transport::{PeerTransport, TransferHandle, TransportEvent};
pub use types::{PeerId, Timestamp};
pub use wire::WirePayload;
