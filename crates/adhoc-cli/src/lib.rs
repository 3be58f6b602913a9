//! Adhoc Chat CLI library
//!
//! Settings persistence and a demo front end over the in-process network.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use app::{DemoApp, DemoReport};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
