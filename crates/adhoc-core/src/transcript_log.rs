//! Ordered transcript log with in-place transfer upgrades
//!
//! The log is an append-only arena of transcripts. In-progress transfers are
//! indexed by resource name so that progress updates and the final
//! completion or failure rewrite the original slot instead of appending a
//! second record. Once a transfer is upgraded its index entry is dropped, so
//! each transfer can be upgraded exactly once.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::errors::TranscriptError;
use crate::transcript::{ResourceName, Transcript, TranscriptKind};

/// Stable position of a transcript in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition(usize);

impl LogPosition {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Ordered sequence of transcripts plus the pending-transfer index
#[derive(Debug, Clone, Default)]
pub struct TranscriptLog {
    entries: Vec<Transcript>,
    pending: HashMap<ResourceName, LogPosition>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transcript at the end of the log
    ///
    /// In-progress transfers are indexed under their resource name. A second
    /// in-progress transcript for a name that is still pending is rejected.
    pub fn append(&mut self, transcript: Transcript) -> Result<LogPosition, TranscriptError> {
        let position = LogPosition(self.entries.len());

        if let TranscriptKind::Progress { resource_name, .. } = &transcript.kind {
            if self.pending.contains_key(resource_name) {
                return Err(TranscriptError::DuplicateResource {
                    resource_name: resource_name.to_string(),
                });
            }
            self.pending.insert(resource_name.clone(), position);
            trace!("Tracking {} at position {}", resource_name, position.0);
        }

        self.entries.push(transcript);
        Ok(position)
    }

    /// Replace the in-progress transcript for `resource_name`
    ///
    /// The replacement must not itself be in progress; the slot keeps its
    /// position and the name is no longer looked up afterwards.
    pub fn upgrade(
        &mut self,
        resource_name: &ResourceName,
        transcript: Transcript,
    ) -> Result<LogPosition, TranscriptError> {
        let Some(&position) = self.pending.get(resource_name) else {
            return Err(TranscriptError::UnknownResource {
                resource_name: resource_name.to_string(),
            });
        };

        if transcript.is_in_progress() {
            return Err(TranscriptError::NotInProgress {
                resource_name: resource_name.to_string(),
            });
        }

        self.pending.remove(resource_name);
        self.entries[position.0] = transcript;
        debug!("Upgraded {} at position {}", resource_name, position.0);
        Ok(position)
    }

    /// Record transfer progress in place
    ///
    /// The fraction is clamped to `[0, 1]` and never decreases. Returns the
    /// position and the fraction now stored.
    pub fn update_progress(
        &mut self,
        resource_name: &ResourceName,
        fraction: f64,
    ) -> Result<(LogPosition, f64), TranscriptError> {
        let position = self.pending_position(resource_name)?;

        let requested = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        match &mut self.entries[position.0].kind {
            TranscriptKind::Progress { fraction, .. } => {
                if requested > *fraction {
                    *fraction = requested;
                }
                Ok((position, *fraction))
            }
            _ => Err(TranscriptError::NotInProgress {
                resource_name: resource_name.to_string(),
            }),
        }
    }

    /// The in-progress transcript for a resource, if any
    pub fn pending(&self, resource_name: &ResourceName) -> Option<&Transcript> {
        self.pending
            .get(resource_name)
            .map(|position| &self.entries[position.0])
    }

    pub fn pending_position(
        &self,
        resource_name: &ResourceName,
    ) -> Result<LogPosition, TranscriptError> {
        self.pending
            .get(resource_name)
            .copied()
            .ok_or_else(|| TranscriptError::UnknownResource {
                resource_name: resource_name.to_string(),
            })
    }

    /// Names of all transfers that have not completed or failed yet
    pub fn pending_resources(&self) -> impl Iterator<Item = &ResourceName> {
        self.pending.keys()
    }

    /// Read-only ordered view, valid until the next mutation
    pub fn all(&self) -> &[Transcript] {
        &self.entries
    }

    /// Owned copy of the current log
    pub fn snapshot(&self) -> Vec<Transcript> {
        self.entries.clone()
    }

    pub fn get(&self, position: LogPosition) -> Option<&Transcript> {
        self.entries.get(position.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
