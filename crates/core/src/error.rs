//! Error types for the Accord broker
//!
//! Every fallible operation in the workspace returns [`AccordError`].
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Classes
//!
//! - Input errors (`InvalidContract`, `InvalidName`) are rejected before
//!   anything is stored.
//! - Lookup errors (`NotFound`, `UnknownContract`, `UnknownParticipant`,
//!   `UnknownVersion`) are surfaced to the caller and never poison the broker.
//! - Store failures (`StoreUnavailable`, `Corruption`) mean the answer is
//!   unknown. They must never be reported as a failed verification or as a
//!   successful deployment check.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for Accord operations
pub type Result<T> = std::result::Result<T, AccordError>;

/// Error types for the Accord broker
#[derive(Debug, Error)]
pub enum AccordError {
    /// Contract content was rejected before storage
    #[error("invalid contract: {0}")]
    InvalidContract(String),

    /// A participant, version or tag name failed validation
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// No contract matched a lookup
    #[error("not found: {0}")]
    NotFound(String),

    /// A contract reference points at no stored revision
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    /// The participant has never been published, verified or tagged
    #[error("unknown participant: {0}")]
    UnknownParticipant(String),

    /// The participant exists but the version does not
    #[error("unknown version {version} of participant {participant}")]
    UnknownVersion {
        /// Participant the version was looked up under
        participant: String,
        /// The missing version
        version: String,
    },

    /// The backing store cannot be read or written
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Persisted data could not be decoded
    #[error("data corruption: {0}")]
    Corruption(String),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl AccordError {
    /// Create an `InvalidContract` error
    pub fn invalid_contract(msg: impl Into<String>) -> Self {
        AccordError::InvalidContract(msg.into())
    }

    /// Create a `NotFound` error
    pub fn not_found(msg: impl Into<String>) -> Self {
        AccordError::NotFound(msg.into())
    }

    /// Create an `UnknownVersion` error
    pub fn unknown_version(participant: impl fmt::Display, version: impl fmt::Display) -> Self {
        AccordError::UnknownVersion {
            participant: participant.to_string(),
            version: version.to_string(),
        }
    }

    /// Create a `StoreUnavailable` error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        AccordError::StoreUnavailable(msg.into())
    }

    /// True for errors raised by the storage layer itself
    ///
    /// A query that fails with one of these has no answer. Callers must
    /// report it as unknown.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            AccordError::StoreUnavailable(_) | AccordError::Corruption(_)
        )
    }
}

impl From<io::Error> for AccordError {
    fn from(e: io::Error) -> Self {
        AccordError::StoreUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for AccordError {
    fn from(e: serde_json::Error) -> Self {
        AccordError::Corruption(e.to_string())
    }
}
