//! Session Channel Communication Types
//!
//! All traffic into and out of the session task flows through these types:
//! `Command` from the UI, `TransportEvent` from the transport and `AppEvent`
//! back to the UI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::peer::Peer;
use crate::transcript::{ResourceName, Transcript};
use crate::transcript_log::LogPosition;
use crate::Result;

// ----------------------------------------------------------------------------
// Command: UI → Session Task
// ----------------------------------------------------------------------------

/// Commands sent from the UI to the session task
///
/// Each command carries a reply channel; the session answers once the
/// command has been applied to the log.
#[derive(Debug)]
pub enum Command {
    /// Broadcast a text message to connected peers
    SendMessage {
        text: String,
        reply: oneshot::Sender<Result<Transcript>>,
    },
    /// Start sending a local file to connected peers
    SendResource {
        path: PathBuf,
        reply: oneshot::Sender<Result<Transcript>>,
    },
    /// Copy of the transcript log
    Snapshot {
        reply: oneshot::Sender<Vec<Transcript>>,
    },
    /// Copy of the peer table
    Peers { reply: oneshot::Sender<Vec<Peer>> },
    /// Current counters
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    /// Stop the transport and end the session task
    Shutdown { reply: oneshot::Sender<()> },
}

// ----------------------------------------------------------------------------
// AppEvent: Session Task → UI
// ----------------------------------------------------------------------------

/// Log and peer changes the presentation layer refreshes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// A new transcript was appended
    TranscriptAppended {
        position: LogPosition,
        transcript: Transcript,
    },
    /// A transfer transcript was completed or failed in place
    TranscriptUpgraded {
        position: LogPosition,
        transcript: Transcript,
    },
    /// An in-progress transfer advanced
    TransferProgress {
        position: LogPosition,
        resource_name: ResourceName,
        fraction: f64,
    },
    /// A peer's connection state changed
    PeerStateChanged { peer: Peer },
}

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

/// Counters kept by the session task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub transfers_started: u64,
    pub transfers_completed: u64,
    pub transfers_failed: u64,
    /// Transport events dropped because they violated the log's invariants
    pub events_dropped: u64,
}
