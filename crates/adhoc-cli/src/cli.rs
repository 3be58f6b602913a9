//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change the saved identity
    Settings {
        /// Display name shown to other peers
        #[arg(short, long)]
        name: Option<String>,
        /// Room to advertise in
        #[arg(short, long)]
        room: Option<String>,
        /// Directory completed transfers are stored in
        #[arg(long)]
        resource_dir: Option<PathBuf>,
    },
    /// Chat with simulated peers over an in-process network
    Demo {
        /// Number of simulated peers
        #[arg(short, long, default_value_t = 2)]
        peers: usize,
        /// Message to send once everyone is connected
        #[arg(short, long, default_value = "hi")]
        message: String,
        /// File to send to every peer
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
