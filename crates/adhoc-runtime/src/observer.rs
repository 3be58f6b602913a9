//! Transcript observers
//!
//! Anything that wants to follow the room (a UI, a test harness, a logger)
//! registers a `TranscriptObserver` with the session. Observers are called
//! from the session task right after the log mutation they describe.

use adhoc_core::{
    channel::AppEventSender, AppEvent, LogPosition, Peer, ResourceName, Transcript,
};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Capability set for following transcript log changes
pub trait TranscriptObserver: Send {
    /// A transcript was appended at `position`
    fn on_transcript_appended(&mut self, position: LogPosition, transcript: &Transcript);

    /// The in-progress transcript at `position` was completed or failed
    fn on_transcript_upgraded(&mut self, position: LogPosition, transcript: &Transcript);

    /// An in-progress transfer advanced
    fn on_transfer_progress(
        &mut self,
        _position: LogPosition,
        _resource_name: &ResourceName,
        _fraction: f64,
    ) {
    }

    /// A peer's connection state changed
    fn on_peer_state_changed(&mut self, _peer: &Peer) {}
}

/// Registered observers, notified in registration order
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn TranscriptObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn TranscriptObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn appended(&mut self, position: LogPosition, transcript: &Transcript) {
        for observer in &mut self.observers {
            observer.on_transcript_appended(position, transcript);
        }
    }

    pub fn upgraded(&mut self, position: LogPosition, transcript: &Transcript) {
        for observer in &mut self.observers {
            observer.on_transcript_upgraded(position, transcript);
        }
    }

    pub fn progress(&mut self, position: LogPosition, resource_name: &ResourceName, fraction: f64) {
        for observer in &mut self.observers {
            observer.on_transfer_progress(position, resource_name, fraction);
        }
    }

    pub fn peer_state_changed(&mut self, peer: &Peer) {
        for observer in &mut self.observers {
            observer.on_peer_state_changed(peer);
        }
    }
}

// ----------------------------------------------------------------------------
// App Event Forwarder
// ----------------------------------------------------------------------------

/// Observer that forwards every change as an `AppEvent`
///
/// Sending never blocks the session task: when the UI falls behind and the
/// channel is full the event is dropped with a warning.
pub struct AppEventForwarder {
    sender: AppEventSender,
}

impl AppEventForwarder {
    pub fn new(sender: AppEventSender) -> Self {
        Self { sender }
    }

    fn forward(&self, event: AppEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("App event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("App event receiver dropped");
            }
        }
    }
}

impl TranscriptObserver for AppEventForwarder {
    fn on_transcript_appended(&mut self, position: LogPosition, transcript: &Transcript) {
        self.forward(AppEvent::TranscriptAppended {
            position,
            transcript: transcript.clone(),
        });
    }

    fn on_transcript_upgraded(&mut self, position: LogPosition, transcript: &Transcript) {
        self.forward(AppEvent::TranscriptUpgraded {
            position,
            transcript: transcript.clone(),
        });
    }

    fn on_transfer_progress(
        &mut self,
        position: LogPosition,
        resource_name: &ResourceName,
        fraction: f64,
    ) {
        self.forward(AppEvent::TransferProgress {
            position,
            resource_name: resource_name.clone(),
            fraction,
        });
    }

    fn on_peer_state_changed(&mut self, peer: &Peer) {
        self.forward(AppEvent::PeerStateChanged { peer: peer.clone() });
    }
}
