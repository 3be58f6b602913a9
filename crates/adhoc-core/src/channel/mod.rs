//! Channel Module
//!
//! Channel infrastructure between the session task and the outside world:
//! - `communication`: commands, app events and session statistics
//! - `utils`: channel type aliases and constructors

pub mod communication;
pub mod utils;

pub use communication::{AppEvent, Command, SessionStats};

pub use crate::config::ChannelConfig;

pub use utils::{
    create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver,
    AppEventSender, CommandReceiver, CommandSender, EventReceiver, EventSender,
};
