//! Session Task Implementation
//!
//! The only task that touches the coordinator. Commands from the UI and
//! events from the transport are drained from their channels here and
//! applied one at a time.

use adhoc_core::{
    channel::{CommandReceiver, EventReceiver},
    AdhocError, Command, Result,
};
use tracing::{debug, error, info, warn};

use crate::coordinator::SessionCoordinator;

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

pub struct SessionTask {
    coordinator: SessionCoordinator,
    command_receiver: CommandReceiver,
    event_receiver: EventReceiver,
    /// Whether the task should continue running
    running: bool,
}

impl SessionTask {
    pub fn new(
        coordinator: SessionCoordinator,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
    ) -> Self {
        Self {
            coordinator,
            command_receiver,
            event_receiver,
            running: true,
        }
    }

    /// Run until shut down or until every command sender is gone
    ///
    /// Returns the coordinator so the final log can still be inspected.
    pub async fn run(mut self) -> Result<SessionCoordinator> {
        info!("Session task starting");
        let mut events_open = true;

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            if let Err(e) = self.process_command(command).await {
                                match e {
                                    AdhocError::Channel { .. } => {
                                        error!("Unrecoverable error processing command, stopping session: {}", e);
                                        self.running = false;
                                    }
                                    _ => warn!("Error processing command: {}", e),
                                }
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            self.stop_transport().await;
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv(), if events_open => {
                    match event {
                        Some(event) => {
                            debug!("Transport event from {}", event.peer_id());
                            if let Err(e) = self.coordinator.process_event(event).await {
                                error!("Error processing transport event: {}", e);
                            }
                        }
                        None => {
                            info!("Event channel closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        info!("Session task stopped");
        Ok(self.coordinator)
    }

    async fn process_command(&mut self, command: Command) -> Result<()> {
        self.coordinator.record_command();

        match command {
            Command::SendMessage { text, reply } => {
                let result = self.coordinator.send_message(&text).await;
                Self::reply(reply, result)
            }
            Command::SendResource { path, reply } => {
                let result = self.coordinator.send_resource(&path).await;
                Self::reply(reply, result)
            }
            Command::Snapshot { reply } => Self::reply(reply, self.coordinator.log().snapshot()),
            Command::Peers { reply } => Self::reply(reply, self.coordinator.peers()),
            Command::Stats { reply } => Self::reply(reply, self.coordinator.stats().clone()),
            Command::Shutdown { reply } => {
                self.stop_transport().await;
                self.running = false;
                Self::reply(reply, ())
            }
        }
    }

    async fn stop_transport(&mut self) {
        if let Err(e) = self.coordinator.shutdown().await {
            warn!("Transport did not stop cleanly: {}", e);
        }
    }

    /// A caller that stopped waiting is not an error for the session
    fn reply<T>(reply: tokio::sync::oneshot::Sender<T>, value: T) -> Result<()> {
        if reply.send(value).is_err() {
            debug!("Command caller went away before the reply");
        }
        Ok(())
    }
}
