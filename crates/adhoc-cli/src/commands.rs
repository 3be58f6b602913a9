//! Command handlers for the adhoc chat CLI

use std::path::{Path, PathBuf};

use tracing::info;

use crate::app::{DemoApp, DemoReport};
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::Result;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    pub async fn execute(command: Commands, config: AppConfig, config_path: &Path) -> Result<()> {
        match command {
            Commands::Settings {
                name,
                room,
                resource_dir,
            } => Self::handle_settings_command(config, config_path, name, room, resource_dir),
            Commands::Demo {
                peers,
                message,
                file,
            } => Self::handle_demo_command(config, peers, message, file).await,
        }
    }

    /// Save the given values, or print the current ones when none are given
    fn handle_settings_command(
        mut config: AppConfig,
        config_path: &Path,
        name: Option<String>,
        room: Option<String>,
        resource_dir: Option<PathBuf>,
    ) -> Result<()> {
        if name.is_none() && room.is_none() && resource_dir.is_none() {
            println!("Settings ({}):", config_path.display());
            println!(
                "  display name: {}",
                config.identity.display_name.as_deref().unwrap_or("<unset>")
            );
            println!(
                "  room:         {}",
                config.identity.room_name.as_deref().unwrap_or("<unset>")
            );
            match &config.session.resource_dir {
                Some(dir) => println!("  resources:    {}", dir.display()),
                None => println!("  resources:    <kept where received>"),
            }
            return Ok(());
        }

        config.apply_overrides(name, room);
        if let Some(dir) = resource_dir {
            config.session = config.session.with_resource_dir(dir);
        }
        config.validate()?;
        config.save_to_file(config_path)?;
        println!("Saved settings to {}", config_path.display());
        Ok(())
    }

    /// Environment overrides apply to this run only and are never saved
    async fn handle_demo_command(
        mut config: AppConfig,
        peers: usize,
        message: String,
        file: Option<PathBuf>,
    ) -> Result<()> {
        config.apply_env_overrides();
        let app = DemoApp::new(&config)?;
        info!("Starting demo with {} simulated peer(s)", peers);
        let report = app.run(peers, &message, file).await?;
        Self::print_report(&report);
        Ok(())
    }

    fn print_report(report: &DemoReport) {
        println!("Transcript:");
        for transcript in &report.transcripts {
            println!("  {}", transcript);
        }

        println!("Peers:");
        for peer in &report.peers {
            println!("  {} ({}) {}", peer.display_name, peer.id, peer.state);
        }

        let stats = &report.stats;
        println!(
            "Sent {} / received {} messages, {} transfer(s) completed, {} failed",
            stats.messages_sent,
            stats.messages_received,
            stats.transfers_completed,
            stats.transfers_failed
        );
    }
}
