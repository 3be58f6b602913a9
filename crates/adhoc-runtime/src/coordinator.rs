//! Session Coordinator
//!
//! Owns everything a running chat room knows: the local identity, the peer
//! table, the transcript log and the in-flight transfers. The coordinator is
//! not shared; `SessionTask` owns it and feeds it commands and transport
//! events one at a time, which keeps every log mutation on a single writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use adhoc_core::{
    AdhocError, Direction, LocalIdentity, Peer, PeerId, PeerState, PeerTransport, ResourceName,
    Result, SessionConfig, SessionStats, Transcript, TranscriptError, TranscriptLog,
    TransportEvent, WirePayload,
};
use tracing::{debug, info, warn};

use crate::observer::{ObserverSet, TranscriptObserver};
use crate::resource_store::ResourceStore;
use crate::transfers::{TransferOutcome, TransferTracker};

/// Failure reason recorded when a resource is sent into an empty room
pub const NO_CONNECTED_PEERS: &str = "no connected peers";

// ----------------------------------------------------------------------------
// Session Coordinator
// ----------------------------------------------------------------------------

pub struct SessionCoordinator {
    identity: LocalIdentity,
    transport: Arc<dyn PeerTransport>,
    log: TranscriptLog,
    peers: HashMap<PeerId, Peer>,
    transfers: TransferTracker,
    store: ResourceStore,
    observers: ObserverSet,
    stats: SessionStats,
}

impl SessionCoordinator {
    /// Validate the identity and start advertising in the room
    pub async fn start(
        display_name: &str,
        room_name: &str,
        transport: Arc<dyn PeerTransport>,
        config: &SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let identity = LocalIdentity::new(display_name, room_name)?;

        transport.advertise(&identity).await?;
        info!(
            "Session started for {} in room {}",
            identity.display_name, identity.room_name
        );

        Ok(Self {
            identity,
            transport,
            log: TranscriptLog::new(),
            peers: HashMap::new(),
            transfers: TransferTracker::new(),
            store: ResourceStore::new(config.resource_dir.clone()),
            observers: ObserverSet::new(),
            stats: SessionStats::default(),
        })
    }

    pub fn register_observer(&mut self, observer: Box<dyn TranscriptObserver>) {
        self.observers.register(observer);
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// Ordered view of the log
    pub fn transcripts(&self) -> &[Transcript] {
        self.log.all()
    }

    pub fn log(&self) -> &TranscriptLog {
        &self.log
    }

    /// Known peers ordered by id
    pub fn peers(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.values().cloned().collect();
        peers.sort_by_key(|peer| peer.id);
        peers
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        let mut connected: Vec<PeerId> = self
            .peers
            .values()
            .filter(|peer| peer.is_connected())
            .map(|peer| peer.id)
            .collect();
        connected.sort();
        connected
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn record_command(&mut self) {
        self.stats.commands_processed += 1;
    }

    // ------------------------------------------------------------------------
    // Outgoing
    // ------------------------------------------------------------------------

    /// Broadcast `text` and record it
    ///
    /// The message is appended even when nobody is connected; it then only
    /// shows up locally.
    pub async fn send_message(&mut self, text: &str) -> Result<Transcript> {
        if text.is_empty() {
            return Err(AdhocError::EmptyMessage);
        }

        let connected = self.connected_peers();
        if connected.is_empty() {
            debug!("No connected peers, message is kept locally");
        } else {
            let data = WirePayload::text(text).encode()?;
            self.transport.send(data, &connected).await?;
        }

        let transcript = Transcript::message(
            Direction::Sent,
            self.identity.display_name.as_str(),
            None,
            text,
        );
        let position = self.log.append(transcript.clone())?;
        self.observers.appended(position, &transcript);
        self.stats.messages_sent += 1;

        Ok(transcript)
    }

    /// Start sending the file at `path` to every connected peer
    ///
    /// Returns the in-progress transcript. With no connected peers the
    /// transfer is recorded and failed on the spot.
    pub async fn send_resource(&mut self, path: &Path) -> Result<Transcript> {
        let resource_name = ResourceName::derive(&self.identity.display_name, path);
        let connected = self.connected_peers();

        let recipients = if connected.is_empty() {
            Vec::new()
        } else {
            self.transport
                .send_resource(&resource_name, path, &connected)
                .await?
                .recipients
        };

        let transcript = Transcript::progress(
            Direction::Sent,
            self.identity.display_name.as_str(),
            None,
            resource_name.clone(),
        );
        let position = self.log.append(transcript.clone())?;
        self.observers.appended(position, &transcript);
        self.stats.transfers_started += 1;

        if recipients.is_empty() {
            info!("Nobody to send {} to", resource_name);
            self.fail_transfer(&resource_name, NO_CONNECTED_PEERS.to_string())?;
        } else {
            info!(
                "Sending {} to {} peer(s)",
                resource_name,
                recipients.len()
            );
            self.transfers
                .start_outgoing(resource_name, path.to_path_buf(), &recipients);
        }

        Ok(transcript)
    }

    /// Stop the transport; the log stays readable
    pub async fn shutdown(&mut self) -> Result<()> {
        self.transport.stop().await?;
        info!(
            "Session for {} closed: {} sent, {} received, {} transfers completed, {} failed, {} events dropped",
            self.identity.display_name,
            self.stats.messages_sent,
            self.stats.messages_received,
            self.stats.transfers_completed,
            self.stats.transfers_failed,
            self.stats.events_dropped
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Incoming
    // ------------------------------------------------------------------------

    /// Apply a transport event, absorbing the errors a misbehaving peer can
    /// cause
    pub async fn process_event(&mut self, event: TransportEvent) -> Result<()> {
        match self.handle_event(event).await {
            Err(e) if e.is_droppable() => {
                warn!("Dropping transport event: {}", e);
                self.stats.events_dropped += 1;
                Ok(())
            }
            other => other,
        }
    }

    /// Apply a transport event
    pub async fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        self.stats.events_processed += 1;

        match event {
            TransportEvent::PeerStateChanged {
                peer_id,
                display_name,
                state,
            } => self.handle_peer_state_changed(peer_id, display_name, state).await,
            TransportEvent::DataReceived { from, data } => self.handle_data_received(from, &data),
            TransportEvent::TransferStarted {
                resource_name,
                from,
            } => self.handle_transfer_started(resource_name, from),
            TransportEvent::TransferProgress {
                resource_name,
                peer_id,
                fraction,
            } => self.handle_transfer_progress(&resource_name, peer_id, fraction),
            TransportEvent::TransferFinished {
                resource_name,
                peer_id,
                location,
            } => {
                let outcome = self
                    .transfers
                    .finished(&resource_name, peer_id, location)
                    .ok_or_else(|| AdhocError::unknown_resource(resource_name.as_str()))?;
                self.apply_outcome(&resource_name, outcome).await
            }
            TransportEvent::TransferFailed {
                resource_name,
                peer_id,
                reason,
            } => {
                let outcome = self
                    .transfers
                    .failed(&resource_name, peer_id, reason)
                    .ok_or_else(|| AdhocError::unknown_resource(resource_name.as_str()))?;
                self.apply_outcome(&resource_name, outcome).await
            }
        }
    }

    async fn handle_peer_state_changed(
        &mut self,
        peer_id: PeerId,
        display_name: String,
        state: PeerState,
    ) -> Result<()> {
        let previous = self.peers.get(&peer_id).map(|peer| peer.state);
        let unchanged = match previous {
            Some(previous) => previous == state,
            None => state == PeerState::NotConnected,
        };

        if unchanged {
            debug!("Peer {} already {}", peer_id, state);
        } else {
            let display_name = if display_name.is_empty() {
                self.peer_name(peer_id)
            } else {
                display_name
            };
            let peer = Peer::new(peer_id, display_name, state);
            info!("Peer {} ({}) is now {}", peer.display_name, peer_id, state);
            self.observers.peer_state_changed(&peer);
            self.peers.insert(peer_id, peer);
        }

        // Transfers can be reported before the peer itself, so a disconnect
        // settles them even when the peer table did not change
        if state == PeerState::NotConnected {
            for (resource_name, outcome) in self.transfers.peer_lost(peer_id) {
                if let Err(e) = self.apply_outcome(&resource_name, outcome).await {
                    warn!("Could not settle {} after losing {}: {}", resource_name, peer_id, e);
                }
            }
        }

        Ok(())
    }

    fn handle_data_received(&mut self, from: PeerId, data: &[u8]) -> Result<()> {
        let WirePayload::Text { body } = WirePayload::decode(data)?;
        if body.is_empty() {
            return Err(AdhocError::EmptyMessage);
        }

        let transcript =
            Transcript::message(Direction::Received, self.peer_name(from), Some(from), body);
        let position = self.log.append(transcript.clone())?;
        self.observers.appended(position, &transcript);
        self.stats.messages_received += 1;
        Ok(())
    }

    fn handle_transfer_started(&mut self, resource_name: ResourceName, from: PeerId) -> Result<()> {
        let disconnected = self
            .peers
            .get(&from)
            .is_some_and(|peer| peer.state == PeerState::NotConnected);
        if disconnected {
            return Err(TranscriptError::SenderNotConnected {
                resource_name: resource_name.to_string(),
                peer_id: from.to_string(),
            }
            .into());
        }

        let transcript = Transcript::progress(
            Direction::Received,
            self.peer_name(from),
            Some(from),
            resource_name.clone(),
        );
        let position = self.log.append(transcript.clone())?;
        debug!("Receiving {} from {}", resource_name, from);

        self.transfers.start_incoming(resource_name, from);
        self.observers.appended(position, &transcript);
        self.stats.transfers_started += 1;
        Ok(())
    }

    fn handle_transfer_progress(
        &mut self,
        resource_name: &ResourceName,
        peer_id: PeerId,
        fraction: f64,
    ) -> Result<()> {
        let aggregate = self
            .transfers
            .progress(resource_name, peer_id, fraction)
            .ok_or_else(|| AdhocError::unknown_resource(resource_name.as_str()))?;
        self.record_progress(resource_name, aggregate)
    }

    // ------------------------------------------------------------------------
    // Transfer Settlement
    // ------------------------------------------------------------------------

    async fn apply_outcome(
        &mut self,
        resource_name: &ResourceName,
        outcome: TransferOutcome,
    ) -> Result<()> {
        match outcome {
            TransferOutcome::Pending { fraction } => self.record_progress(resource_name, fraction),
            TransferOutcome::Completed { location } => {
                self.complete_transfer(resource_name, location).await
            }
            TransferOutcome::Failed { reason } => self.fail_transfer(resource_name, reason),
        }
    }

    fn record_progress(&mut self, resource_name: &ResourceName, fraction: f64) -> Result<()> {
        let (position, stored) = self.log.update_progress(resource_name, fraction)?;
        self.observers.progress(position, resource_name, stored);
        Ok(())
    }

    async fn complete_transfer(
        &mut self,
        resource_name: &ResourceName,
        location: PathBuf,
    ) -> Result<()> {
        let pending = self
            .log
            .pending(resource_name)
            .cloned()
            .ok_or_else(|| AdhocError::unknown_resource(resource_name.as_str()))?;

        let upgraded = match self.store.persist(resource_name, &location).await {
            Ok(stable) => {
                self.stats.transfers_completed += 1;
                info!("Transfer {} completed at {}", resource_name, stable.display());
                pending.completed(stable)
            }
            Err(e) => {
                self.stats.transfers_failed += 1;
                warn!("Could not store {}: {}", resource_name, e);
                pending.failed(format!("could not store resource: {}", e))
            }
        }
        .ok_or_else(|| AdhocError::unknown_resource(resource_name.as_str()))?;

        let position = self.log.upgrade(resource_name, upgraded)?;
        if let Some(transcript) = self.log.get(position) {
            self.observers.upgraded(position, transcript);
        }
        Ok(())
    }

    fn fail_transfer(&mut self, resource_name: &ResourceName, reason: String) -> Result<()> {
        let failed = self
            .log
            .pending(resource_name)
            .and_then(|transcript| transcript.failed(reason.as_str()))
            .ok_or_else(|| AdhocError::unknown_resource(resource_name.as_str()))?;

        let position = self.log.upgrade(resource_name, failed)?;
        self.stats.transfers_failed += 1;
        info!("Transfer {} failed: {}", resource_name, reason);
        if let Some(transcript) = self.log.get(position) {
            self.observers.upgraded(position, transcript);
        }
        Ok(())
    }

    fn peer_name(&self, peer_id: PeerId) -> String {
        self.peers
            .get(&peer_id)
            .map(|peer| peer.display_name.clone())
            .unwrap_or_else(|| peer_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adhoc_core::{TranscriptKind, TransferHandle};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Transport that records calls and never emits events
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(Vec<u8>, Vec<PeerId>)>>,
        resources: Mutex<Vec<(ResourceName, Vec<PeerId>)>>,
        stopped: Mutex<bool>,
    }

    #[async_trait]
    impl PeerTransport for RecordingTransport {
        async fn advertise(&self, _identity: &LocalIdentity) -> Result<()> {
            Ok(())
        }

        async fn send(&self, data: Vec<u8>, peers: &[PeerId]) -> Result<()> {
            self.sent.lock().unwrap().push((data, peers.to_vec()));
            Ok(())
        }

        async fn send_resource(
            &self,
            resource_name: &ResourceName,
            _path: &Path,
            peers: &[PeerId],
        ) -> Result<TransferHandle> {
            self.resources
                .lock()
                .unwrap()
                .push((resource_name.clone(), peers.to_vec()));
            Ok(TransferHandle {
                resource_name: resource_name.clone(),
                recipients: peers.to_vec(),
            })
        }

        async fn stop(&self) -> Result<()> {
            *self.stopped.lock().unwrap() = true;
            Ok(())
        }
    }

    fn bob() -> PeerId {
        PeerId::new([0xb0, 0xb0, 0, 0, 0, 0, 0, 1])
    }

    async fn session(transport: Arc<RecordingTransport>) -> SessionCoordinator {
        SessionCoordinator::start("Alice", "Room-1", transport, &SessionConfig::default())
            .await
            .unwrap()
    }

    async fn connect(session: &mut SessionCoordinator, peer_id: PeerId, name: &str) {
        session
            .process_event(TransportEvent::PeerStateChanged {
                peer_id,
                display_name: name.to_string(),
                state: PeerState::Connected,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_room() {
        let transport = Arc::new(RecordingTransport::default());
        let result =
            SessionCoordinator::start("Alice", "Room--1", transport, &SessionConfig::default())
                .await;
        assert!(matches!(result, Err(AdhocError::InvalidIdentity(_))));
    }

    #[tokio::test]
    async fn test_send_message_broadcasts_to_connected_peers() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport.clone()).await;
        connect(&mut session, bob(), "Bob").await;

        let transcript = session.send_message("hi").await.unwrap();
        assert_eq!(
            transcript.kind,
            TranscriptKind::Message {
                body: "hi".to_string()
            }
        );

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, vec![bob()]);
        assert_eq!(
            WirePayload::decode(&sent[0].0).unwrap(),
            WirePayload::text("hi")
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_not_recorded() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport.clone()).await;

        assert!(matches!(
            session.send_message("").await,
            Err(AdhocError::EmptyMessage)
        ));
        assert!(session.transcripts().is_empty());
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resource_to_empty_room_fails_immediately() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport.clone()).await;

        let transcript = session
            .send_resource(Path::new("/tmp/photo.jpg"))
            .await
            .unwrap();
        assert!(transcript.is_in_progress());

        match &session.transcripts()[0].kind {
            TranscriptKind::Failed { reason, .. } => assert_eq!(reason, NO_CONNECTED_PEERS),
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(transport.resources.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_fails_outgoing_transfer_once() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport).await;
        connect(&mut session, bob(), "Bob").await;

        let transcript = session
            .send_resource(Path::new("/tmp/photo.jpg"))
            .await
            .unwrap();
        let resource_name = transcript.resource_name().unwrap().clone();

        session
            .process_event(TransportEvent::TransferProgress {
                resource_name: resource_name.clone(),
                peer_id: bob(),
                fraction: 0.4,
            })
            .await
            .unwrap();

        for _ in 0..2 {
            session
                .process_event(TransportEvent::PeerStateChanged {
                    peer_id: bob(),
                    display_name: "Bob".to_string(),
                    state: PeerState::NotConnected,
                })
                .await
                .unwrap();
        }

        assert_eq!(session.transcripts().len(), 1);
        match &session.transcripts()[0].kind {
            TranscriptKind::Failed { fraction, .. } => assert_eq!(*fraction, 0.4),
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(session.stats().transfers_failed, 1);
    }

    fn disconnected(peer_id: PeerId) -> TransportEvent {
        TransportEvent::PeerStateChanged {
            peer_id,
            display_name: "Bob".to_string(),
            state: PeerState::NotConnected,
        }
    }

    #[tokio::test]
    async fn test_disconnect_fails_transfer_from_unlisted_peer() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport).await;
        let resource_name = ResourceName::from("Bob-1-cat.png");

        session
            .process_event(TransportEvent::TransferStarted {
                resource_name: resource_name.clone(),
                from: bob(),
            })
            .await
            .unwrap();
        session.process_event(disconnected(bob())).await.unwrap();

        assert_eq!(session.transcripts().len(), 1);
        match &session.transcripts()[0].kind {
            TranscriptKind::Failed {
                resource_name: failed,
                ..
            } => assert_eq!(failed, &resource_name),
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(session.stats().transfers_failed, 1);
        assert!(session.peers().is_empty());

        session.process_event(disconnected(bob())).await.unwrap();
        assert_eq!(session.stats().transfers_failed, 1);
    }

    #[tokio::test]
    async fn test_transfer_from_disconnected_peer_is_dropped() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport).await;
        connect(&mut session, bob(), "Bob").await;
        session.process_event(disconnected(bob())).await.unwrap();

        session
            .process_event(TransportEvent::TransferStarted {
                resource_name: ResourceName::from("Bob-1-cat.png"),
                from: bob(),
            })
            .await
            .unwrap();

        assert!(session.transcripts().is_empty());
        assert_eq!(session.stats().events_dropped, 1);
        assert_eq!(session.stats().transfers_started, 0);
    }

    #[tokio::test]
    async fn test_garbage_data_is_dropped() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport).await;

        session
            .process_event(TransportEvent::DataReceived {
                from: bob(),
                data: vec![0xff; 3],
            })
            .await
            .unwrap();

        assert!(session.transcripts().is_empty());
        assert_eq!(session.stats().events_dropped, 1);
    }

    #[tokio::test]
    async fn test_unknown_sender_named_by_id() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport).await;

        let data = WirePayload::text("yo").encode().unwrap();
        session
            .process_event(TransportEvent::DataReceived { from: bob(), data })
            .await
            .unwrap();

        let transcript = &session.transcripts()[0];
        assert_eq!(transcript.direction, Direction::Received);
        assert_eq!(transcript.peer_display_name, bob().to_string());
        assert_eq!(transcript.peer_id, Some(bob()));
    }

    #[tokio::test]
    async fn test_shutdown_stops_transport() {
        let transport = Arc::new(RecordingTransport::default());
        let mut session = session(transport.clone()).await;
        session.shutdown().await.unwrap();
        assert!(*transport.stopped.lock().unwrap());
    }
}
