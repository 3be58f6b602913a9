//! Two sessions talking over the in-process network

use std::path::PathBuf;
use std::time::Duration;

use adhoc_core::{
    channel::AppEventReceiver, AdhocResult, AppEvent, ChannelConfig, Direction, SessionConfig,
    Transcript, TranscriptKind,
};
use adhoc_runtime::{MemoryNetwork, MemoryTransportConfig, SessionBuilder, SessionHandle};
use tempfile::TempDir;
use tokio::time::timeout;

struct TestPeer {
    handle: SessionHandle,
    app_events: AppEventReceiver,
    resource_dir: PathBuf,
}

async fn join(network: &MemoryNetwork, name: &str, workspace: &TempDir) -> TestPeer {
    let resource_dir = workspace.path().join(name);
    let config = SessionConfig::default()
        .with_channels(ChannelConfig::testing())
        .with_resource_dir(&resource_dir);

    let mut builder = SessionBuilder::new(config).unwrap();
    let app_events = builder.subscribe_app_events();
    let transport = network.join(builder.event_sender());
    let handle = builder.start(name, "Room-1", transport).await.unwrap();

    TestPeer {
        handle,
        app_events,
        resource_dir,
    }
}

async fn next_transcript(
    app_events: &mut AppEventReceiver,
    upgraded: bool,
) -> Transcript {
    timeout(Duration::from_secs(5), async {
        loop {
            match app_events.recv().await.expect("app event channel closed") {
                AppEvent::TranscriptAppended { transcript, .. } if !upgraded => return transcript,
                AppEvent::TranscriptUpgraded { transcript, .. } if upgraded => return transcript,
                _ => {}
            }
        }
    })
    .await
    .expect("expected transcript within timeout")
}

async fn wait_connected(peer: &mut TestPeer) {
    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(AppEvent::PeerStateChanged { peer: changed }) =
                peer.app_events.recv().await
            {
                if changed.is_connected() {
                    return;
                }
            }
        }
    })
    .await
    .expect("peers should connect within timeout");
}

#[tokio::test]
async fn test_message_reaches_other_session() -> AdhocResult<()> {
    let workspace = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new(MemoryTransportConfig::testing());
    let mut alice = join(&network, "Alice", &workspace).await;
    let mut bob = join(&network, "Bob", &workspace).await;
    wait_connected(&mut alice).await;
    wait_connected(&mut bob).await;

    alice.handle.send_message("hi").await?;

    let received = next_transcript(&mut bob.app_events, false).await;
    assert_eq!(received.direction, Direction::Received);
    assert_eq!(received.peer_display_name, "Alice");
    assert_eq!(
        received.kind,
        TranscriptKind::Message {
            body: "hi".to_string()
        }
    );

    let (alice_done, bob_done) =
        futures::future::join(alice.handle.shutdown(), bob.handle.shutdown()).await;
    alice_done?;
    bob_done
}

#[tokio::test]
async fn test_resource_is_stored_on_both_sides() -> AdhocResult<()> {
    let workspace = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new(MemoryTransportConfig {
        inbox_dir: workspace.path().join("inbox"),
        ..MemoryTransportConfig::testing()
    });
    let mut alice = join(&network, "Alice", &workspace).await;
    let mut bob = join(&network, "Bob", &workspace).await;
    wait_connected(&mut alice).await;
    wait_connected(&mut bob).await;

    let source = workspace.path().join("photo.jpg");
    tokio::fs::write(&source, b"not really a jpeg").await.unwrap();

    let sent = alice.handle.send_resource(&source).await?;
    assert!(sent.is_in_progress());
    let resource_name = sent.resource_name().unwrap().clone();

    for peer in [&mut alice, &mut bob] {
        let done = next_transcript(&mut peer.app_events, true).await;
        let (name, location) = match done.kind {
            TranscriptKind::Resource {
                resource_name,
                location,
            } => (resource_name, location),
            other => panic!("expected completed transfer, got {:?}", other),
        };
        assert_eq!(name, resource_name);
        assert!(location.starts_with(&peer.resource_dir));
        assert_eq!(
            tokio::fs::read(&location).await.unwrap(),
            b"not really a jpeg"
        );
    }

    let stats = bob.handle.stats().await?;
    assert_eq!(stats.transfers_completed, 1);

    alice.handle.shutdown().await?;
    bob.handle.shutdown().await
}

#[tokio::test]
async fn test_peer_leaving_fails_transfer() -> AdhocResult<()> {
    let workspace = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new(MemoryTransportConfig {
        chunks: 50,
        chunk_delay_ms: 20,
        inbox_dir: workspace.path().join("inbox"),
    });
    let mut alice = join(&network, "Alice", &workspace).await;
    let mut bob = join(&network, "Bob", &workspace).await;
    wait_connected(&mut alice).await;
    wait_connected(&mut bob).await;

    let source = workspace.path().join("big.bin");
    tokio::fs::write(&source, vec![7u8; 1024]).await.unwrap();
    alice.handle.send_resource(&source).await?;

    bob.handle.shutdown().await?;

    let failed = next_transcript(&mut alice.app_events, true).await;
    assert!(matches!(failed.kind, TranscriptKind::Failed { .. }));

    let transcripts = alice.handle.transcripts().await?;
    assert_eq!(transcripts.len(), 1);
    assert_eq!(alice.handle.stats().await?.transfers_failed, 1);

    alice.handle.shutdown().await
}

#[tokio::test]
async fn test_crowded_room_starts_with_small_buffers() -> AdhocResult<()> {
    let workspace = tempfile::tempdir().unwrap();
    let network = MemoryNetwork::new(MemoryTransportConfig {
        inbox_dir: workspace.path().join("inbox"),
        ..MemoryTransportConfig::testing()
    });
    let channels = ChannelConfig {
        event_buffer_size: 4,
        ..ChannelConfig::testing()
    };

    let mut handles = Vec::new();
    for n in 0..8 {
        let config = SessionConfig::default().with_channels(channels.clone());
        let builder = SessionBuilder::new(config)?;
        let transport = network.join(builder.event_sender());
        let name = format!("Peer-{}", n);
        let handle = timeout(Duration::from_secs(3), builder.start(&name, "Room-1", transport))
            .await
            .expect("session start should not wait on its own event channel")?;
        handles.push(handle);
    }

    for handle in &handles {
        timeout(Duration::from_secs(5), async {
            loop {
                let peers = handle.peers().await?;
                if peers.iter().filter(|peer| peer.is_connected()).count() == 7 {
                    return AdhocResult::Ok(());
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("every peer should see the rest of the room")?;
    }

    for mut handle in handles {
        handle.shutdown().await?;
    }
    Ok(())
}
