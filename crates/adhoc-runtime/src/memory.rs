//! In-process peer network
//!
//! `MemoryNetwork` links any number of sessions inside one process. Peers
//! that advertise in the same room connect to each other, text is delivered
//! directly and resources are sent in chunks with progress callbacks. Used by
//! the CLI demo and by tests; it never touches a real network.
//!
//! Every member gets an unbounded queue drained into its session's event
//! channel by a pump task, so no transport call waits on a session that is
//! busy, not yet started, or itself waiting on this caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use adhoc_core::{
    channel::EventSender, LocalIdentity, PeerId, PeerState, PeerTransport, ResourceName, Result,
    TransferHandle, TransportEvent,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Transfer simulation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTransportConfig {
    /// Number of progress steps per transfer
    pub chunks: u32,
    /// Delay before each chunk
    pub chunk_delay_ms: u64,
    /// Where received resources land before the session stores them. The
    /// network never removes it; whoever picks the directory cleans it up.
    pub inbox_dir: PathBuf,
}

impl Default for MemoryTransportConfig {
    fn default() -> Self {
        Self {
            chunks: 4,
            chunk_delay_ms: 25,
            inbox_dir: std::env::temp_dir()
                .join("adhoc-chat-memory")
                .join(uuid::Uuid::new_v4().simple().to_string()),
        }
    }
}

impl MemoryTransportConfig {
    /// Fast transfers for tests
    pub fn testing() -> Self {
        Self {
            chunks: 2,
            chunk_delay_ms: 1,
            ..Self::default()
        }
    }

    fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

// ----------------------------------------------------------------------------
// Network
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Member {
    display_name: String,
    room: Option<String>,
    queue: mpsc::UnboundedSender<TransportEvent>,
}

#[derive(Debug)]
struct NetworkInner {
    members: DashMap<PeerId, Member>,
    config: MemoryTransportConfig,
}

/// Shared registry of in-process peers
#[derive(Debug, Clone)]
pub struct MemoryNetwork {
    inner: Arc<NetworkInner>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new(MemoryTransportConfig::default())
    }
}

impl MemoryNetwork {
    pub fn new(config: MemoryTransportConfig) -> Self {
        Self {
            inner: Arc::new(NetworkInner {
                members: DashMap::new(),
                config,
            }),
        }
    }

    /// Create a transport that reports to `events`
    ///
    /// Must be called inside a tokio runtime.
    pub fn join(&self, events: EventSender) -> Arc<MemoryTransport> {
        let peer_id = PeerId::generate();
        let (queue, pending) = mpsc::unbounded_channel();
        tokio::spawn(pump(pending, events));
        self.inner.members.insert(
            peer_id,
            Member {
                display_name: peer_id.to_string(),
                room: None,
                queue,
            },
        );
        debug!("Peer {} joined the memory network", peer_id);

        Arc::new(MemoryTransport {
            peer_id,
            network: self.clone(),
        })
    }

    /// Peers currently registered, advertising or not
    pub fn len(&self) -> usize {
        self.inner.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.members.is_empty()
    }

    fn member(&self, peer_id: PeerId) -> Option<Member> {
        self.inner.members.get(&peer_id).map(|m| m.value().clone())
    }

    /// Other members advertising in `room`
    fn room_members(&self, room: &str, except: PeerId) -> Vec<(PeerId, Member)> {
        self.inner
            .members
            .iter()
            .filter(|entry| *entry.key() != except && entry.room.as_deref() == Some(room))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn linked(&self, a: PeerId, b: PeerId) -> bool {
        match (self.member(a), self.member(b)) {
            (Some(a), Some(b)) => a.room.is_some() && a.room == b.room,
            _ => false,
        }
    }
}

/// Forward queued events into the session until either side goes away
async fn pump(mut pending: mpsc::UnboundedReceiver<TransportEvent>, events: EventSender) {
    while let Some(event) = pending.recv().await {
        if events.send(event).await.is_err() {
            debug!("Session stopped listening, dropping transport events");
            return;
        }
    }
}

fn deliver(member: &Member, event: TransportEvent) {
    if member.queue.send(event).is_err() {
        debug!("Pump for {} is gone, dropping transport event", member.display_name);
    }
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

/// One peer's view of a `MemoryNetwork`
#[derive(Debug)]
pub struct MemoryTransport {
    peer_id: PeerId,
    network: MemoryNetwork,
}

impl MemoryTransport {
    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn transfer(
        network: MemoryNetwork,
        from: PeerId,
        to: PeerId,
        resource_name: ResourceName,
        source: PathBuf,
        bytes: Arc<Vec<u8>>,
    ) {
        let (Some(sender), Some(recipient)) = (network.member(from), network.member(to)) else {
            return;
        };
        let config = &network.inner.config;

        deliver(
            &recipient,
            TransportEvent::TransferStarted {
                resource_name: resource_name.clone(),
                from,
            },
        );

        let chunks = config.chunks.max(1);
        for chunk in 1..=chunks {
            tokio::time::sleep(config.chunk_delay()).await;
            // Losing the link is reported through the peer state alone
            if !network.linked(from, to) {
                debug!("Transfer {} to {} interrupted", resource_name, to);
                return;
            }
            let fraction = f64::from(chunk) / f64::from(chunks);
            deliver(
                &sender,
                TransportEvent::TransferProgress {
                    resource_name: resource_name.clone(),
                    peer_id: to,
                    fraction,
                },
            );
            deliver(
                &recipient,
                TransportEvent::TransferProgress {
                    resource_name: resource_name.clone(),
                    peer_id: from,
                    fraction,
                },
            );
        }

        match write_inbox(&config.inbox_dir, to, &resource_name, &bytes).await {
            Ok(location) => {
                deliver(
                    &recipient,
                    TransportEvent::TransferFinished {
                        resource_name: resource_name.clone(),
                        peer_id: from,
                        location,
                    },
                );
                deliver(
                    &sender,
                    TransportEvent::TransferFinished {
                        resource_name,
                        peer_id: to,
                        location: source,
                    },
                );
            }
            Err(e) => {
                warn!("Memory transfer {} failed: {}", resource_name, e);
                let reason = e.to_string();
                deliver(
                    &recipient,
                    TransportEvent::TransferFailed {
                        resource_name: resource_name.clone(),
                        peer_id: from,
                        reason: reason.clone(),
                    },
                );
                deliver(
                    &sender,
                    TransportEvent::TransferFailed {
                        resource_name,
                        peer_id: to,
                        reason,
                    },
                );
            }
        }
    }
}

async fn write_inbox(
    inbox_dir: &Path,
    recipient: PeerId,
    resource_name: &ResourceName,
    bytes: &[u8],
) -> std::io::Result<PathBuf> {
    let dir = inbox_dir.join(recipient.to_string());
    tokio::fs::create_dir_all(&dir).await?;
    let location = dir.join(resource_name.as_str().replace(['/', '\\'], "_"));
    tokio::fs::write(&location, bytes).await?;
    Ok(location)
}

#[async_trait]
impl PeerTransport for MemoryTransport {
    async fn advertise(&self, identity: &LocalIdentity) -> Result<()> {
        let room = identity.room_name.as_str().to_string();
        let display_name = identity.display_name.as_str().to_string();

        let Some(me) = self.network.inner.members.get_mut(&self.peer_id).map(|mut member| {
            member.display_name = display_name.clone();
            member.room = Some(room.clone());
            member.clone()
        }) else {
            return Err(adhoc_core::TransportError::AdvertiseFailed {
                room,
                reason: "transport already stopped".to_string(),
            }
            .into());
        };
        info!("{} advertising in room {}", display_name, room);

        for (peer_id, other) in self.network.room_members(&room, self.peer_id) {
            for state in [PeerState::Connecting, PeerState::Connected] {
                deliver(
                    &me,
                    TransportEvent::PeerStateChanged {
                        peer_id,
                        display_name: other.display_name.clone(),
                        state,
                    },
                );
                deliver(
                    &other,
                    TransportEvent::PeerStateChanged {
                        peer_id: self.peer_id,
                        display_name: display_name.clone(),
                        state,
                    },
                );
            }
        }
        Ok(())
    }

    async fn send(&self, data: Vec<u8>, peers: &[PeerId]) -> Result<()> {
        for peer_id in peers {
            if !self.network.linked(self.peer_id, *peer_id) {
                debug!("Skipping unlinked peer {}", peer_id);
                continue;
            }
            if let Some(member) = self.network.member(*peer_id) {
                deliver(
                    &member,
                    TransportEvent::DataReceived {
                        from: self.peer_id,
                        data: data.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn send_resource(
        &self,
        resource_name: &ResourceName,
        path: &Path,
        peers: &[PeerId],
    ) -> Result<TransferHandle> {
        let bytes = Arc::new(tokio::fs::read(path).await?);
        let recipients: Vec<PeerId> = peers
            .iter()
            .copied()
            .filter(|peer_id| self.network.linked(self.peer_id, *peer_id))
            .collect();

        for recipient in &recipients {
            tokio::spawn(Self::transfer(
                self.network.clone(),
                self.peer_id,
                *recipient,
                resource_name.clone(),
                path.to_path_buf(),
                bytes.clone(),
            ));
        }

        Ok(TransferHandle {
            resource_name: resource_name.clone(),
            recipients,
        })
    }

    async fn stop(&self) -> Result<()> {
        let Some((_, me)) = self.network.inner.members.remove(&self.peer_id) else {
            return Ok(());
        };
        info!("{} left the memory network", me.display_name);

        if let Some(room) = me.room {
            for (_, other) in self.network.room_members(&room, self.peer_id) {
                deliver(
                    &other,
                    TransportEvent::PeerStateChanged {
                        peer_id: self.peer_id,
                        display_name: me.display_name.clone(),
                        state: PeerState::NotConnected,
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adhoc_core::{
        channel::{create_event_channel, EventReceiver},
        ChannelConfig,
    };
    use tokio::time::timeout;

    async fn next_event(events: &mut EventReceiver) -> TransportEvent {
        timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("expected transport event within timeout")
            .expect("event channel closed")
    }

    fn peer_state(peer_id: PeerId, name: &str, state: PeerState) -> TransportEvent {
        TransportEvent::PeerStateChanged {
            peer_id,
            display_name: name.to_string(),
            state,
        }
    }

    #[tokio::test]
    async fn test_peers_in_same_room_connect() {
        let network = MemoryNetwork::new(MemoryTransportConfig::testing());
        let config = ChannelConfig::testing();
        let (alice_events, mut alice_rx) = create_event_channel(&config);
        let (bob_events, mut bob_rx) = create_event_channel(&config);
        let (carol_events, mut carol_rx) = create_event_channel(&config);

        let alice = network.join(alice_events);
        let bob = network.join(bob_events);
        let carol = network.join(carol_events);

        alice
            .advertise(&LocalIdentity::new("Alice", "Room-1").unwrap())
            .await
            .unwrap();
        carol
            .advertise(&LocalIdentity::new("Carol", "Other").unwrap())
            .await
            .unwrap();
        bob.advertise(&LocalIdentity::new("Bob", "Room-1").unwrap())
            .await
            .unwrap();

        for state in [PeerState::Connecting, PeerState::Connected] {
            assert_eq!(
                next_event(&mut alice_rx).await,
                peer_state(bob.peer_id(), "Bob", state)
            );
            assert_eq!(
                next_event(&mut bob_rx).await,
                peer_state(alice.peer_id(), "Alice", state)
            );
        }
        assert!(timeout(Duration::from_millis(50), carol_rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stop_disconnects_room() {
        let network = MemoryNetwork::new(MemoryTransportConfig::testing());
        let config = ChannelConfig::testing();
        let (alice_events, mut alice_rx) = create_event_channel(&config);
        let (bob_events, _bob_rx) = create_event_channel(&config);

        let alice = network.join(alice_events);
        let bob = network.join(bob_events);
        alice
            .advertise(&LocalIdentity::new("Alice", "Room-1").unwrap())
            .await
            .unwrap();
        bob.advertise(&LocalIdentity::new("Bob", "Room-1").unwrap())
            .await
            .unwrap();

        bob.stop().await.unwrap();
        assert_eq!(network.len(), 1);
        for state in [
            PeerState::Connecting,
            PeerState::Connected,
            PeerState::NotConnected,
        ] {
            assert_eq!(
                next_event(&mut alice_rx).await,
                peer_state(bob.peer_id(), "Bob", state)
            );
        }

        // Sending to a departed peer is silently skipped
        alice.send(vec![1, 2, 3], &[bob.peer_id()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_crowded_room_never_waits_on_readers() {
        let network = MemoryNetwork::new(MemoryTransportConfig::testing());
        let config = ChannelConfig {
            event_buffer_size: 1,
            ..ChannelConfig::testing()
        };

        // Nobody reads these channels until every peer has advertised
        let mut receivers = Vec::new();
        let mut transports = Vec::new();
        for n in 0..6 {
            let (events, rx) = create_event_channel(&config);
            receivers.push(rx);
            let transport = network.join(events);
            let identity = LocalIdentity::new(format!("Peer-{}", n).as_str(), "Room-1").unwrap();
            timeout(Duration::from_secs(1), transport.advertise(&identity))
                .await
                .expect("advertise should not wait on full channels")
                .unwrap();
            transports.push(transport);
        }

        timeout(
            Duration::from_secs(1),
            transports[0].send(vec![1], &[transports[1].peer_id()]),
        )
        .await
        .expect("send should not wait on full channels")
        .unwrap();

        // Each peer still sees both steps for each of the five others
        for rx in &mut receivers {
            for _ in 0..10 {
                assert!(matches!(
                    next_event(rx).await,
                    TransportEvent::PeerStateChanged { .. }
                ));
            }
        }
    }
}
