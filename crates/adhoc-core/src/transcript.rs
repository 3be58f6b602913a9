//! Transcript records
//!
//! A transcript is one chat event as shown in the room history: a text
//! message, a resource transfer that is still running, a completed transfer,
//! or a transfer that failed. Transfers start as `Progress` and are later
//! replaced in place by `Resource` or `Failed` under the same resource name.

use core::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::identity::DisplayName;
use crate::types::{PeerId, Timestamp};

// ----------------------------------------------------------------------------
// Resource Name
// ----------------------------------------------------------------------------

/// Name under which a transfer is tracked while it runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derive a name for an outgoing resource
    ///
    /// The name is `<sender>-<uuid>-<file name>` so that two transfers of the
    /// same file, or files from different peers, never share a key.
    pub fn derive(sender: &DisplayName, path: &Path) -> Self {
        let sender: String = sender
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "resource".to_string());

        Self(format!(
            "{}-{}-{}",
            sender,
            uuid::Uuid::new_v4().simple(),
            file_name
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

// ----------------------------------------------------------------------------
// Transcript
// ----------------------------------------------------------------------------

/// Whether the local peer sent or received the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Sent,
    Received,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranscriptKind {
    /// UTF-8 text message
    Message { body: String },
    /// Transfer still running
    Progress {
        resource_name: ResourceName,
        fraction: f64,
    },
    /// Transfer finished; the resource is available locally
    Resource {
        resource_name: ResourceName,
        location: PathBuf,
    },
    /// Transfer aborted; terminal and never retried
    Failed {
        resource_name: ResourceName,
        fraction: f64,
        reason: String,
    },
}

/// One entry of the room history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub direction: Direction,
    /// Originating peer for received events, the local peer for sent ones
    pub peer_display_name: String,
    /// Remote peer for received events
    pub peer_id: Option<PeerId>,
    pub timestamp: Timestamp,
    pub kind: TranscriptKind,
}

impl Transcript {
    pub fn message(
        direction: Direction,
        peer_display_name: impl Into<String>,
        peer_id: Option<PeerId>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            direction,
            peer_display_name: peer_display_name.into(),
            peer_id,
            timestamp: Timestamp::now(),
            kind: TranscriptKind::Message { body: body.into() },
        }
    }

    pub fn progress(
        direction: Direction,
        peer_display_name: impl Into<String>,
        peer_id: Option<PeerId>,
        resource_name: ResourceName,
    ) -> Self {
        Self {
            direction,
            peer_display_name: peer_display_name.into(),
            peer_id,
            timestamp: Timestamp::now(),
            kind: TranscriptKind::Progress {
                resource_name,
                fraction: 0.0,
            },
        }
    }

    /// Completed form of this transfer, keeping sender, direction and time
    pub fn completed(&self, location: PathBuf) -> Option<Self> {
        let TranscriptKind::Progress { resource_name, .. } = &self.kind else {
            return None;
        };
        Some(Self {
            kind: TranscriptKind::Resource {
                resource_name: resource_name.clone(),
                location,
            },
            ..self.clone()
        })
    }

    /// Failed form of this transfer, keeping the last reported fraction
    pub fn failed(&self, reason: impl Into<String>) -> Option<Self> {
        let TranscriptKind::Progress {
            resource_name,
            fraction,
        } = &self.kind
        else {
            return None;
        };
        Some(Self {
            kind: TranscriptKind::Failed {
                resource_name: resource_name.clone(),
                fraction: *fraction,
                reason: reason.into(),
            },
            ..self.clone()
        })
    }

    /// Resource name for any transfer transcript
    pub fn resource_name(&self) -> Option<&ResourceName> {
        match &self.kind {
            TranscriptKind::Message { .. } => None,
            TranscriptKind::Progress { resource_name, .. }
            | TranscriptKind::Resource { resource_name, .. }
            | TranscriptKind::Failed { resource_name, .. } => Some(resource_name),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.kind, TranscriptKind::Progress { .. })
    }

    pub fn progress_fraction(&self) -> Option<f64> {
        match self.kind {
            TranscriptKind::Progress { fraction, .. } => Some(fraction),
            _ => None,
        }
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            Direction::Sent => "->",
            Direction::Received => "<-",
        };
        match &self.kind {
            TranscriptKind::Message { body } => {
                write!(f, "{} {}: {}", arrow, self.peer_display_name, body)
            }
            TranscriptKind::Progress {
                resource_name,
                fraction,
            } => write!(
                f,
                "{} {}: {} [{:.0}%]",
                arrow,
                self.peer_display_name,
                resource_name,
                fraction * 100.0
            ),
            TranscriptKind::Resource {
                resource_name,
                location,
            } => write!(
                f,
                "{} {}: {} ({})",
                arrow,
                self.peer_display_name,
                resource_name,
                location.display()
            ),
            TranscriptKind::Failed {
                resource_name,
                reason,
                ..
            } => write!(
                f,
                "{} {}: {} failed: {}",
                arrow, self.peer_display_name, resource_name, reason
            ),
        }
    }
}
