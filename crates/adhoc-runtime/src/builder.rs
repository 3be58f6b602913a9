//! Session Builder API
//!
//! Wires a transport, the session task and the presentation layer together.
//! The event channel exists before the transport so the transport can be
//! constructed with its `EventSender`:
//!
//! ```ignore
//! let builder = SessionBuilder::new(SessionConfig::default())?;
//! let transport = network.join("Alice", builder.event_sender());
//! let session = builder.start("Alice", "Room-1", transport).await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use adhoc_core::{
    channel::{
        create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver,
        CommandReceiver, CommandSender, EventReceiver, EventSender,
    },
    AdhocError, Command, LocalIdentity, Peer, PeerTransport, Result, SessionConfig, SessionStats,
    Transcript,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;

use crate::coordinator::SessionCoordinator;
use crate::observer::{AppEventForwarder, TranscriptObserver};
use crate::task::SessionTask;

// ----------------------------------------------------------------------------
// Session Builder
// ----------------------------------------------------------------------------

pub struct SessionBuilder {
    config: SessionConfig,
    command_sender: CommandSender,
    command_receiver: CommandReceiver,
    event_sender: EventSender,
    event_receiver: EventReceiver,
    observers: Vec<Box<dyn TranscriptObserver>>,
}

impl SessionBuilder {
    pub fn new(config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let (command_sender, command_receiver) = create_command_channel(&config.channels);
        let (event_sender, event_receiver) = create_event_channel(&config.channels);

        Ok(Self {
            config,
            command_sender,
            command_receiver,
            event_sender,
            event_receiver,
            observers: Vec::new(),
        })
    }

    /// Sender the transport reports its callbacks on
    pub fn event_sender(&self) -> EventSender {
        self.event_sender.clone()
    }

    pub fn with_observer(mut self, observer: Box<dyn TranscriptObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Receive log and peer changes as `AppEvent`s
    pub fn subscribe_app_events(&mut self) -> AppEventReceiver {
        let (sender, receiver) = create_app_event_channel(&self.config.channels);
        self.observers.push(Box::new(AppEventForwarder::new(sender)));
        receiver
    }

    /// Validate the identity, advertise and spawn the session task
    pub async fn start(
        self,
        display_name: &str,
        room_name: &str,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<SessionHandle> {
        let mut coordinator =
            SessionCoordinator::start(display_name, room_name, transport, &self.config).await?;
        for observer in self.observers {
            coordinator.register_observer(observer);
        }

        let identity = coordinator.identity().clone();
        let task = SessionTask::new(coordinator, self.command_receiver, self.event_receiver);
        let task_handle = tokio::spawn(task.run());

        info!("Session for {} running", identity.display_name);

        Ok(SessionHandle {
            identity,
            command_sender: self.command_sender,
            event_sender: self.event_sender,
            task_handle: Some(task_handle),
        })
    }
}

// ----------------------------------------------------------------------------
// Session Handle
// ----------------------------------------------------------------------------

/// Handle to a running session task
pub struct SessionHandle {
    identity: LocalIdentity,
    command_sender: CommandSender,
    event_sender: EventSender,
    task_handle: Option<JoinHandle<Result<SessionCoordinator>>>,
}

impl SessionHandle {
    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn event_sender(&self) -> EventSender {
        self.event_sender.clone()
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Result<Transcript> {
        let text = text.into();
        self.request(|reply| Command::SendMessage { text, reply })
            .await?
    }

    pub async fn send_resource(&self, path: impl Into<PathBuf>) -> Result<Transcript> {
        let path = path.into();
        self.request(|reply| Command::SendResource { path, reply })
            .await?
    }

    /// Copy of the transcript log
    pub async fn transcripts(&self) -> Result<Vec<Transcript>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn peers(&self) -> Result<Vec<Peer>> {
        self.request(|reply| Command::Peers { reply }).await
    }

    pub async fn stats(&self) -> Result<SessionStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the transport and wait for the session task to end
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.task_handle.take() else {
            return Ok(());
        };
        info!("Shutting down session for {}", self.identity.display_name);

        // A task that already ended has stopped its transport on the way out
        let _ = self.request(|reply| Command::Shutdown { reply }).await;

        match handle.await {
            Ok(result) => result.map(|_| ()),
            Err(e) => Err(AdhocError::channel_error(format!(
                "Session task panicked: {}",
                e
            ))),
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.command_sender
            .send(command(reply))
            .await
            .map_err(|_| AdhocError::channel_error("Session task is not running"))?;
        response
            .await
            .map_err(|_| AdhocError::channel_error("Session task dropped the request"))
    }
}
