//! Adhoc Chat CLI Configuration
//!
//! Settings live in a TOML file, by default
//! `<config dir>/adhoc-chat/config.toml`. The saved identity can be
//! overridden per run with `ADHOC_CHAT_DISPLAY_NAME` and `ADHOC_CHAT_ROOM`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use adhoc_core::{DisplayName, LocalIdentity, RoomName, SessionConfig};
use adhoc_runtime::MemoryTransportConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CliError, Result};

pub const DISPLAY_NAME_ENV: &str = "ADHOC_CHAT_DISPLAY_NAME";
pub const ROOM_ENV: &str = "ADHOC_CHAT_ROOM";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub identity: IdentitySettings,
    pub session: SessionConfig,
    pub demo: DemoConfig,
}

/// Saved identity; both fields are validated before they are stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub display_name: Option<String>,
    pub room_name: Option<String>,
}

/// Simulation settings for the `demo` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub chunks: u32,
    pub chunk_delay_ms: u64,
    /// How long to wait for peers and transfers
    pub timeout_secs: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            chunks: 4,
            chunk_delay_ms: 25,
            timeout_secs: 10,
        }
    }
}

impl DemoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn transport_config(&self, inbox_dir: impl Into<PathBuf>) -> MemoryTransportConfig {
        MemoryTransportConfig {
            chunks: self.chunks,
            chunk_delay_ms: self.chunk_delay_ms,
            inbox_dir: inbox_dir.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Saving
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("adhoc-chat").join("config.toml"))
            .ok_or_else(|| {
                CliError::Config("no configuration directory on this system".to_string())
            })
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Apply `ADHOC_CHAT_DISPLAY_NAME` and `ADHOC_CHAT_ROOM`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(DISPLAY_NAME_ENV).ok(),
            std::env::var(ROOM_ENV).ok(),
        );
    }

    pub fn apply_overrides(&mut self, display_name: Option<String>, room_name: Option<String>) {
        if let Some(display_name) = display_name {
            self.identity.display_name = Some(display_name);
        }
        if let Some(room_name) = room_name {
            self.identity.room_name = Some(room_name);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(display_name) = &self.identity.display_name {
            DisplayName::parse(display_name.as_str())?;
        }
        if let Some(room_name) = &self.identity.room_name {
            RoomName::parse(room_name.as_str())?;
        }
        self.session.validate()?;
        if self.demo.timeout_secs == 0 {
            return Err(CliError::Config(
                "demo timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The identity to start a session with
    pub fn local_identity(&self) -> Result<LocalIdentity> {
        let display_name = self
            .identity
            .display_name
            .as_deref()
            .ok_or(CliError::MissingSettings {
                field: "display name",
            })?;
        let room_name = self
            .identity
            .room_name
            .as_deref()
            .ok_or(CliError::MissingSettings { field: "room name" })?;
        Ok(LocalIdentity::new(display_name, room_name)?)
    }
}
