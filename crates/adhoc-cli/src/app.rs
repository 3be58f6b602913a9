//! Demo session over the in-process network
//!
//! Starts the local session plus a number of simulated peers in the same
//! room, exchanges a few messages and optionally a file, then shuts
//! everything down and reports the final log.

use std::path::{Path, PathBuf};
use std::time::Duration;

use adhoc_core::{
    channel::AppEventReceiver, AppEvent, LocalIdentity, Peer, ResourceName, SessionConfig,
    SessionStats, Transcript,
};
use adhoc_runtime::{MemoryNetwork, SessionBuilder, SessionHandle};
use tempfile::TempDir;
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// What the local peer saw during a demo run
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub transcripts: Vec<Transcript>,
    pub peers: Vec<Peer>,
    pub stats: SessionStats,
}

pub struct DemoApp {
    identity: LocalIdentity,
    session_config: SessionConfig,
    network: MemoryNetwork,
    wait_limit: Duration,
    // Removed with the app
    inbox: TempDir,
}

impl DemoApp {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let identity = config.local_identity()?;
        let inbox = tempfile::Builder::new()
            .prefix("adhoc-chat-inbox-")
            .tempdir()?;
        debug!("Demo inbox at {}", inbox.path().display());

        Ok(Self {
            identity,
            session_config: config.session.clone(),
            network: MemoryNetwork::new(config.demo.transport_config(inbox.path())),
            wait_limit: config.demo.timeout(),
            inbox,
        })
    }

    /// Where the in-process network drops received files
    pub fn inbox_dir(&self) -> &Path {
        self.inbox.path()
    }

    pub async fn run(
        &self,
        peer_count: usize,
        message: &str,
        file: Option<PathBuf>,
    ) -> Result<DemoReport> {
        let (mut local, mut app_events) = self.start_local().await?;

        let mut simulated = Vec::with_capacity(peer_count);
        for n in 1..=peer_count {
            simulated.push(self.start_simulated(&format!("Peer-{}", n)).await?);
        }
        // Every participant sees everyone else before anything is sent
        self.wait_for_peers(&local, peer_count).await?;
        for peer in &simulated {
            self.wait_for_peers(peer, peer_count).await?;
        }

        for peer in &simulated {
            peer.send_message(format!("hello from {}", peer.identity().display_name))
                .await?;
        }
        local.send_message(message).await?;

        let mut expected = peer_count + 1;
        if let Some(path) = file {
            let transcript = local.send_resource(path).await?;
            if let Some(resource_name) = transcript.resource_name() {
                self.wait_for_transfer(&mut app_events, resource_name).await?;
            }
            expected += 1;
        }
        self.wait_for_log(&local, expected).await?;

        let report = DemoReport {
            transcripts: local.transcripts().await?,
            peers: local.peers().await?,
            stats: local.stats().await?,
        };

        for mut peer in simulated {
            peer.shutdown().await?;
        }
        local.shutdown().await?;
        Ok(report)
    }

    async fn start_local(&self) -> Result<(SessionHandle, AppEventReceiver)> {
        let mut builder = SessionBuilder::new(self.session_config.clone())?;
        let app_events = builder.subscribe_app_events();
        let transport = self.network.join(builder.event_sender());
        let handle = builder
            .start(
                self.identity.display_name.as_str(),
                self.identity.room_name.as_str(),
                transport,
            )
            .await?;
        Ok((handle, app_events))
    }

    async fn start_simulated(&self, name: &str) -> Result<SessionHandle> {
        let config = SessionConfig::default().with_channels(self.session_config.channels.clone());
        let builder = SessionBuilder::new(config)?;
        let transport = self.network.join(builder.event_sender());
        let handle = builder
            .start(name, self.identity.room_name.as_str(), transport)
            .await?;
        debug!("Simulated peer {} joined", name);
        Ok(handle)
    }

    async fn wait_for_peers(&self, local: &SessionHandle, count: usize) -> Result<()> {
        let deadline = Instant::now() + self.wait_limit;
        loop {
            let connected = local
                .peers()
                .await?
                .iter()
                .filter(|peer| peer.is_connected())
                .count();
            if connected >= count {
                info!("{} peer(s) connected", connected);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CliError::Demo(format!(
                    "only {} of {} peers connected",
                    connected, count
                )));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn wait_for_log(&self, local: &SessionHandle, count: usize) -> Result<()> {
        let deadline = Instant::now() + self.wait_limit;
        while local.transcripts().await?.len() < count {
            if Instant::now() >= deadline {
                return Err(CliError::Demo("not every message arrived".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    async fn wait_for_transfer(
        &self,
        app_events: &mut AppEventReceiver,
        resource_name: &ResourceName,
    ) -> Result<()> {
        let settled = timeout(self.wait_limit, async {
            while let Some(event) = app_events.recv().await {
                match event {
                    AppEvent::TransferProgress {
                        resource_name: name,
                        fraction,
                        ..
                    } if &name == resource_name => {
                        info!("{}: {:.0}%", name, fraction * 100.0);
                    }
                    AppEvent::TranscriptUpgraded { transcript, .. }
                        if transcript.resource_name() == Some(resource_name) =>
                    {
                        return true;
                    }
                    _ => {}
                }
            }
            false
        })
        .await;

        match settled {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::Demo("session stopped during transfer".to_string())),
            Err(_) => Err(CliError::Demo(format!(
                "transfer {} did not finish in time",
                resource_name
            ))),
        }
    }
}
