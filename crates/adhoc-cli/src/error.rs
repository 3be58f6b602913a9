//! Error handling for the adhoc chat CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Chat session error: {0}")]
    Session(#[from] adhoc_core::AdhocError),

    #[error("Invalid identity: {0}")]
    Identity(#[from] adhoc_core::IdentityError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No {field} configured; run `adhoc-chat settings --name <NAME> --room <ROOM>` first")]
    MissingSettings { field: &'static str },

    #[error("Demo did not finish: {0}")]
    Demo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
