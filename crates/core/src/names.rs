//! Participant, version and tag identifiers
//!
//! Participants have a semantic name ("billing-service"), versions are
//! opaque identifiers chosen by the publisher (a git sha, a semver string),
//! and tags are mutable labels ("main", "production").
//!
//! ## Validation
//!
//! Participant and tag names must:
//! - Be 1-128 characters
//! - Contain only alphanumeric, dash, underscore, dot
//! - Not start with a dash or dot
//!
//! Version identifiers must be 1-256 printable characters without
//! whitespace.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AccordError;

/// Maximum length of a participant or tag name
pub const MAX_NAME_LENGTH: usize = 128;

/// Maximum length of a version identifier
pub const MAX_VERSION_LENGTH: usize = 256;

/// Error when validating an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name is empty
    Empty,
    /// Name exceeds maximum length
    TooLong {
        /// Actual length of the name
        length: usize,
        /// Maximum allowed length
        max: usize,
    },
    /// Name contains invalid character
    InvalidChar {
        /// The invalid character
        char: char,
        /// Position of the invalid character
        position: usize,
    },
    /// Name starts with invalid character
    InvalidStart {
        /// The invalid starting character
        char: char,
    },
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::Empty => write!(f, "name cannot be empty"),
            NameError::TooLong { length, max } => {
                write!(f, "name too long: {} chars (max {})", length, max)
            }
            NameError::InvalidChar { char, position } => {
                write!(f, "invalid character {:?} at position {}", char, position)
            }
            NameError::InvalidStart { char } => {
                write!(
                    f,
                    "name cannot start with '{}' (must start with alphanumeric or underscore)",
                    char
                )
            }
        }
    }
}

impl std::error::Error for NameError {}

impl From<NameError> for AccordError {
    fn from(e: NameError) -> Self {
        AccordError::InvalidName(e.to_string())
    }
}

fn validate_label(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(NameError::TooLong {
            length: name.len(),
            max: MAX_NAME_LENGTH,
        });
    }

    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphanumeric() && first != '_' {
            return Err(NameError::InvalidStart { char: first });
        }
    }

    for (pos, ch) in name.chars().enumerate() {
        if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.') {
            return Err(NameError::InvalidChar {
                char: ch,
                position: pos,
            });
        }
    }
    Ok(())
}

fn validate_version(version: &str) -> Result<(), NameError> {
    if version.is_empty() {
        return Err(NameError::Empty);
    }
    if version.len() > MAX_VERSION_LENGTH {
        return Err(NameError::TooLong {
            length: version.len(),
            max: MAX_VERSION_LENGTH,
        });
    }
    for (pos, ch) in version.chars().enumerate() {
        if ch.is_whitespace() || ch.is_control() {
            return Err(NameError::InvalidChar {
                char: ch,
                position: pos,
            });
        }
    }
    Ok(())
}

// ============================================================================
// ParticipantName
// ============================================================================

/// Name of a consumer or provider
///
/// Roles are relative to a contract: the same participant can be the
/// consumer of one contract and the provider of another.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantName(String);

impl ParticipantName {
    /// Create a new participant name, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_label(&name)?;
        Ok(ParticipantName(name))
    }

    /// Get the name as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// VersionId
// ============================================================================

/// Immutable version identifier of one participant
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Create a new version identifier, validating the input
    pub fn new(version: impl Into<String>) -> Result<Self, NameError> {
        let version = version.into();
        validate_version(&version)?;
        Ok(VersionId(version))
    }

    /// Get the version as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// TagName
// ============================================================================

/// Mutable label pointing at one version of a participant
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    /// Create a new tag name, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate_label(&name)?;
        Ok(TagName(name))
    }

    /// Get the tag as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Shared trait implementations
// ============================================================================

macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $ty {
            type Error = NameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $ty::new(value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = NameError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                $ty::new(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = NameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::new(s)
            }
        }
    };
}

string_newtype_impls!(ParticipantName);
string_newtype_impls!(VersionId);
string_newtype_impls!(TagName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_participant_names() {
        assert!(ParticipantName::new("billing-service").is_ok());
        assert!(ParticipantName::new("web_ui").is_ok());
        assert!(ParticipantName::new("api.v2").is_ok());
        assert!(ParticipantName::new("_internal").is_ok());
    }

    #[test]
    fn test_invalid_participant_names() {
        assert_eq!(ParticipantName::new(""), Err(NameError::Empty));
        assert_eq!(
            ParticipantName::new("-leading"),
            Err(NameError::InvalidStart { char: '-' })
        );
        assert_eq!(
            ParticipantName::new("has space"),
            Err(NameError::InvalidChar {
                char: ' ',
                position: 3
            })
        );
        let long = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            ParticipantName::new(long),
            Err(NameError::TooLong { .. })
        ));
    }

    #[test]
    fn test_version_allows_semver_and_hashes() {
        assert!(VersionId::new("1.0.0+build.5").is_ok());
        assert!(VersionId::new("4f2a9c1").is_ok());
        assert!(VersionId::new("feature/login@3").is_ok());
        assert!(VersionId::new("has space").is_err());
        assert!(VersionId::new("").is_err());
    }

    #[test]
    fn test_tag_rules_match_participant_rules() {
        assert!(TagName::new("production").is_ok());
        assert!(TagName::new(".hidden").is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<ParticipantName, _> = serde_json::from_str("\"billing\"");
        assert!(ok.is_ok());
        let bad: Result<ParticipantName, _> = serde_json::from_str("\"bad name\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_name_error_converts_to_accord_error() {
        let err: AccordError = NameError::Empty.into();
        assert!(matches!(err, AccordError::InvalidName(_)));
    }
}
