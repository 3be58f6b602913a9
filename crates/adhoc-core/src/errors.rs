//! Error types for the adhoc chat core
//!
//! This module contains all error types used by the transcript model and the
//! session layers built on top of it: identity validation errors, transcript
//! log errors, transport errors and the `AdhocError` type that unifies them.

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Which identity field failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    DisplayName,
    RoomName,
}

impl core::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            IdentityField::DisplayName => write!(f, "display name"),
            IdentityField::RoomName => write!(f, "room name"),
        }
    }
}

/// Specific identity validation error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("{field} must not be empty")]
    Empty { field: IdentityField },
    #[error("{field} too long: {length} characters (max: {max})")]
    TooLong {
        field: IdentityField,
        length: usize,
        max: usize,
    },
    #[error("room name contains invalid character {character:?}")]
    InvalidCharacter { character: char },
    #[error("room name must contain at least one letter")]
    MissingLetter,
    #[error("room name must not begin or end with a hyphen")]
    EdgeHyphen,
    #[error("room name must not contain adjacent hyphens")]
    AdjacentHyphens,
}

/// Specific transcript log error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptError {
    #[error("No in-progress transfer for resource {resource_name}")]
    UnknownResource { resource_name: String },
    #[error("Resource {resource_name} already has an in-progress transfer")]
    DuplicateResource { resource_name: String },
    #[error("Transcript for {resource_name} is not an in-progress transfer")]
    NotInProgress { resource_name: String },
    #[error("Transfer {resource_name} started by disconnected peer {peer_id}")]
    SenderNotConnected {
        resource_name: String,
        peer_id: String,
    },
}

/// Specific transport error types
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Advertising failed for room {room}: {reason}")]
    AdvertiseFailed { room: String, reason: String },
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Resource transfer could not start for {resource_name}: {reason}")]
    TransferFailed {
        resource_name: String,
        reason: String,
    },
    #[error("Peer not found: {peer_id}")]
    PeerNotFound { peer_id: String },
    #[error("Transport shutdown: {reason}")]
    Shutdown { reason: String },
}

// ----------------------------------------------------------------------------
// Unified Error Type
// ----------------------------------------------------------------------------

/// Core error types for the adhoc chat session
#[derive(Debug, thiserror::Error)]
pub enum AdhocError {
    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    #[error("Refusing to send an empty message")]
    EmptyMessage,

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Wire encoding error: {0}")]
    Wire(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel communication error between the session task and its callers
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl AdhocError {
    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        AdhocError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        AdhocError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an unknown resource error
    pub fn unknown_resource<T: Into<String>>(resource_name: T) -> Self {
        AdhocError::Transcript(TranscriptError::UnknownResource {
            resource_name: resource_name.into(),
        })
    }

    /// Create a send failure error
    pub fn send_failed<T: Into<String>>(reason: T) -> Self {
        AdhocError::Transport(TransportError::SendFailed {
            reason: reason.into(),
        })
    }

    /// Whether the error is a protocol invariant violation that the session
    /// absorbs by dropping the offending event
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            AdhocError::Transcript(_) | AdhocError::Wire(_) | AdhocError::EmptyMessage
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, AdhocError>;
pub type AdhocResult<T> = Result<T>;
