//! In-flight transfer tracking
//!
//! The transcript log only knows one record per transfer. The transport,
//! however, reports outgoing transfers once per recipient. `TransferTracker`
//! folds those per-peer callbacks into a single outcome per resource:
//!
//! - outgoing progress is the minimum over recipients still in the transfer
//! - an outgoing transfer completes once every remaining recipient finished,
//!   and fails when every recipient failed or disconnected
//! - an incoming transfer follows its single sender

use std::collections::HashMap;
use std::path::PathBuf;

use adhoc_core::{PeerId, ResourceName};

/// Result of folding a transport callback into a transfer
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// Still running; `fraction` is the aggregate progress
    Pending { fraction: f64 },
    /// Done; the resource is at `location`
    Completed { location: PathBuf },
    /// Aborted
    Failed { reason: String },
}

impl TransferOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferOutcome::Pending { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RecipientState {
    Sending(f64),
    Finished,
    Failed,
}

#[derive(Debug)]
struct OutgoingTransfer {
    source: PathBuf,
    recipients: HashMap<PeerId, RecipientState>,
    last_failure: Option<String>,
}

impl OutgoingTransfer {
    fn outcome(&self) -> TransferOutcome {
        let mut fraction: Option<f64> = None;
        let mut any_sending = false;
        let mut any_finished = false;

        for state in self.recipients.values() {
            match state {
                RecipientState::Sending(progress) => {
                    any_sending = true;
                    fraction = Some(fraction.map_or(*progress, |f| f.min(*progress)));
                }
                RecipientState::Finished => any_finished = true,
                RecipientState::Failed => {}
            }
        }

        if any_sending {
            TransferOutcome::Pending {
                fraction: fraction.unwrap_or(0.0),
            }
        } else if any_finished {
            TransferOutcome::Completed {
                location: self.source.clone(),
            }
        } else {
            TransferOutcome::Failed {
                reason: self
                    .last_failure
                    .clone()
                    .unwrap_or_else(|| "no recipients".to_string()),
            }
        }
    }
}

#[derive(Debug)]
struct IncomingTransfer {
    from: PeerId,
}

/// Per-resource bookkeeping for transfers that have not ended yet
#[derive(Debug, Default)]
pub struct TransferTracker {
    outgoing: HashMap<ResourceName, OutgoingTransfer>,
    incoming: HashMap<ResourceName, IncomingTransfer>,
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_outgoing(
        &mut self,
        resource_name: ResourceName,
        source: PathBuf,
        recipients: &[PeerId],
    ) {
        let recipients = recipients
            .iter()
            .map(|peer| (*peer, RecipientState::Sending(0.0)))
            .collect();
        self.outgoing.insert(
            resource_name,
            OutgoingTransfer {
                source,
                recipients,
                last_failure: None,
            },
        );
    }

    pub fn start_incoming(&mut self, resource_name: ResourceName, from: PeerId) {
        self.incoming.insert(resource_name, IncomingTransfer { from });
    }

    pub fn contains(&self, resource_name: &ResourceName) -> bool {
        self.outgoing.contains_key(resource_name) || self.incoming.contains_key(resource_name)
    }

    pub fn active_count(&self) -> usize {
        self.outgoing.len() + self.incoming.len()
    }

    /// Fold a progress report. Returns `None` when the resource is unknown or
    /// `peer_id` takes no part in it.
    pub fn progress(
        &mut self,
        resource_name: &ResourceName,
        peer_id: PeerId,
        fraction: f64,
    ) -> Option<f64> {
        if let Some(transfer) = self.outgoing.get_mut(resource_name) {
            let state = transfer.recipients.get_mut(&peer_id)?;
            if let RecipientState::Sending(current) = state {
                if fraction > *current {
                    *current = fraction.min(1.0);
                }
            }
            return match transfer.outcome() {
                TransferOutcome::Pending { fraction } => Some(fraction),
                _ => None,
            };
        }

        match self.incoming.get(resource_name) {
            Some(transfer) if transfer.from == peer_id => Some(fraction),
            _ => None,
        }
    }

    /// Fold a finished report
    pub fn finished(
        &mut self,
        resource_name: &ResourceName,
        peer_id: PeerId,
        location: PathBuf,
    ) -> Option<TransferOutcome> {
        if let Some(transfer) = self.outgoing.get_mut(resource_name) {
            let state = transfer.recipients.get_mut(&peer_id)?;
            *state = RecipientState::Finished;
            return Some(self.settle_outgoing(resource_name));
        }

        match self.incoming.get(resource_name) {
            Some(transfer) if transfer.from == peer_id => {
                self.incoming.remove(resource_name);
                Some(TransferOutcome::Completed { location })
            }
            _ => None,
        }
    }

    /// Fold a failure report
    pub fn failed(
        &mut self,
        resource_name: &ResourceName,
        peer_id: PeerId,
        reason: String,
    ) -> Option<TransferOutcome> {
        if let Some(transfer) = self.outgoing.get_mut(resource_name) {
            let state = transfer.recipients.get_mut(&peer_id)?;
            if *state == RecipientState::Finished {
                return None;
            }
            *state = RecipientState::Failed;
            transfer.last_failure = Some(reason);
            return Some(self.settle_outgoing(resource_name));
        }

        match self.incoming.get(resource_name) {
            Some(transfer) if transfer.from == peer_id => {
                self.incoming.remove(resource_name);
                Some(TransferOutcome::Failed { reason })
            }
            _ => None,
        }
    }

    /// Abort everything `peer_id` takes part in
    ///
    /// Returns only transfers whose outcome changed to terminal or whose
    /// aggregate progress may have moved.
    pub fn peer_lost(&mut self, peer_id: PeerId) -> Vec<(ResourceName, TransferOutcome)> {
        let reason = format!("peer {} disconnected", peer_id);
        let mut affected: Vec<ResourceName> = self
            .incoming
            .iter()
            .filter(|(_, transfer)| transfer.from == peer_id)
            .map(|(name, _)| name.clone())
            .chain(
                self.outgoing
                    .iter()
                    .filter(|(_, transfer)| {
                        matches!(
                            transfer.recipients.get(&peer_id),
                            Some(RecipientState::Sending(_))
                        )
                    })
                    .map(|(name, _)| name.clone()),
            )
            .collect();
        affected.sort();

        affected
            .into_iter()
            .filter_map(|name| {
                let outcome = self.failed(&name, peer_id, reason.clone())?;
                Some((name, outcome))
            })
            .collect()
    }

    fn settle_outgoing(&mut self, resource_name: &ResourceName) -> TransferOutcome {
        let outcome = self
            .outgoing
            .get(resource_name)
            .map(OutgoingTransfer::outcome)
            .unwrap_or(TransferOutcome::Failed {
                reason: "untracked transfer".to_string(),
            });
        if outcome.is_terminal() {
            self.outgoing.remove(resource_name);
        }
        outcome
    }
}
