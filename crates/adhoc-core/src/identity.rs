//! Local identity and room-name validation
//!
//! A session is created from a display name and a room name (the discovery
//! service type). Both are validated here, regardless of what the caller
//! already checked.
//!
//! Room names follow the DNS-SD service name syntax:
//! - 1 to 15 US-ASCII characters
//! - only letters, digits and hyphens
//! - at least one letter
//! - no leading or trailing hyphen
//! - no adjacent hyphens

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::errors::{IdentityError, IdentityField};

/// Maximum room name length in characters
pub const MAX_ROOM_NAME_LENGTH: usize = 15;

/// Maximum display name length in characters
pub const MAX_DISPLAY_NAME_LENGTH: usize = 63;

// ----------------------------------------------------------------------------
// Display Name
// ----------------------------------------------------------------------------

/// Validated display name for the local peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentityError> {
        let value = value.into();
        validate_display_name(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Room Name
// ----------------------------------------------------------------------------

/// Validated room name (discovery service type)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

impl RoomName {
    pub fn parse(value: impl Into<String>) -> Result<Self, IdentityError> {
        let value = value.into();
        validate_room_name(&value)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(name: RoomName) -> Self {
        name.0
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ----------------------------------------------------------------------------
// Local Identity
// ----------------------------------------------------------------------------

/// The local peer's presence in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub display_name: DisplayName,
    pub room_name: RoomName,
}

impl LocalIdentity {
    /// Validate both fields, display name first
    pub fn new(display_name: &str, room_name: &str) -> Result<Self, IdentityError> {
        Ok(Self {
            display_name: DisplayName::parse(display_name)?,
            room_name: RoomName::parse(room_name)?,
        })
    }
}

// ----------------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------------

pub fn validate_display_name(name: &str) -> Result<(), IdentityError> {
    if name.trim().is_empty() {
        return Err(IdentityError::Empty {
            field: IdentityField::DisplayName,
        });
    }

    let length = name.chars().count();
    if length > MAX_DISPLAY_NAME_LENGTH {
        return Err(IdentityError::TooLong {
            field: IdentityField::DisplayName,
            length,
            max: MAX_DISPLAY_NAME_LENGTH,
        });
    }

    Ok(())
}

pub fn validate_room_name(name: &str) -> Result<(), IdentityError> {
    if name.is_empty() {
        return Err(IdentityError::Empty {
            field: IdentityField::RoomName,
        });
    }

    let length = name.chars().count();
    if length > MAX_ROOM_NAME_LENGTH {
        return Err(IdentityError::TooLong {
            field: IdentityField::RoomName,
            length,
            max: MAX_ROOM_NAME_LENGTH,
        });
    }

    if let Some(character) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
    {
        return Err(IdentityError::InvalidCharacter { character });
    }

    if !name.bytes().any(|b| b.is_ascii_alphabetic()) {
        return Err(IdentityError::MissingLetter);
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(IdentityError::EdgeHyphen);
    }

    if name.contains("--") {
        return Err(IdentityError::AdjacentHyphens);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_name_examples() {
        assert!(validate_room_name("Room-1").is_ok());
        assert_eq!(validate_room_name("-Room"), Err(IdentityError::EdgeHyphen));
        assert_eq!(validate_room_name("Room-"), Err(IdentityError::EdgeHyphen));
        assert_eq!(
            validate_room_name("Room--1"),
            Err(IdentityError::AdjacentHyphens)
        );
        assert_eq!(
            validate_room_name("1234567890123456"),
            Err(IdentityError::TooLong {
                field: IdentityField::RoomName,
                length: 16,
                max: 15
            })
        );
        assert_eq!(validate_room_name("12345"), Err(IdentityError::MissingLetter));
    }

    #[test]
    fn test_room_name_boundaries() {
        assert!(validate_room_name("a").is_ok());
        assert!(validate_room_name("abcdefghijklmno").is_ok());
        assert!(matches!(
            validate_room_name(""),
            Err(IdentityError::Empty { .. })
        ));
        assert_eq!(
            validate_room_name("room_1"),
            Err(IdentityError::InvalidCharacter { character: '_' })
        );
        assert_eq!(
            validate_room_name("café"),
            Err(IdentityError::InvalidCharacter { character: 'é' })
        );
    }

    #[test]
    fn test_display_name_rules() {
        assert!(validate_display_name("Alice").is_ok());
        assert!(validate_display_name("Zoë 🎉").is_ok());
        assert!(validate_display_name(&"x".repeat(63)).is_ok());
        assert!(matches!(
            validate_display_name(&"x".repeat(64)),
            Err(IdentityError::TooLong { length: 64, .. })
        ));
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name("   ").is_err());
    }

    #[test]
    fn test_local_identity_checks_both_fields() {
        let identity = LocalIdentity::new("Alice", "Room-1").unwrap();
        assert_eq!(identity.display_name.as_str(), "Alice");
        assert_eq!(identity.room_name.as_str(), "Room-1");

        assert!(LocalIdentity::new("", "Room-1").is_err());
        assert!(LocalIdentity::new("Alice", "Room--1").is_err());
    }
}
