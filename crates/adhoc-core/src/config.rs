//! Session Configuration
//!
//! Configuration structures shared by the session runtime and the CLI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{AdhocError, Result};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the session channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI → Session)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Transport → Session)
    pub event_buffer_size: usize,
    /// Buffer size for AppEvent channels (Session → UI)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,    // UI commands are infrequent
            event_buffer_size: 128,     // Transfer progress can be bursty
            app_event_buffer_size: 128, // UI updates need responsiveness
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            command_buffer_size: 8,
            event_buffer_size: 32,
            app_event_buffer_size: 32,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 16,
            event_buffer_size: 256,
            app_event_buffer_size: 256,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_buffer_size == 0
            || self.event_buffer_size == 0
            || self.app_event_buffer_size == 0
        {
            return Err(AdhocError::config_error(
                "channel buffer sizes must be greater than zero",
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Configuration for one chat session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory completed transfers are copied into. When unset the path
    /// reported by the transport is kept as the resource location.
    pub resource_dir: Option<PathBuf>,
    /// Channel buffer sizes
    pub channels: ChannelConfig,
}

impl SessionConfig {
    pub fn with_resource_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_dir = Some(dir.into());
        self
    }

    pub fn with_channels(mut self, channels: ChannelConfig) -> Self {
        self.channels = channels;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.channels.validate()
    }
}
