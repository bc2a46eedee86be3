//! Core types for Accord
//!
//! This crate defines the foundational types used throughout the broker:
//! - Names: ParticipantName, VersionId, TagName
//! - Timestamp: microsecond timestamps rendered as RFC 3339
//! - Contract documents: Interaction, request/response/body matchers
//! - Matching: comparing observed responses against expectations
//! - References: ContractKey, ContractRef, VerificationRef
//! - Verification reports and deployment query/response types
//! - Error: AccordError and the Result alias

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contract;
pub mod deploy;
pub mod error;
pub mod matching;
pub mod names;
pub mod refs;
pub mod timestamp;
pub mod verification;

pub use contract::{
    validate_interactions, BodyMatcher, ContentHash, ContractDocument, HttpMethod, Interaction,
    Metadata, PartyRef, ProviderState, RequestMatcher, ResponseMatcher, DEFAULT_SPEC_VERSION,
};
pub use deploy::{
    DeploymentQuery, DeploymentResponse, EmptyPolicy, Reason, Satisfied, Unsatisfied, Verdict,
};
pub use error::{AccordError, Result};
pub use matching::{match_body, match_response, Mismatch, ObservedResponse};
pub use names::{NameError, ParticipantName, TagName, VersionId};
pub use refs::{ContractKey, ContractRef, VerificationRef};
pub use timestamp::Timestamp;
pub use verification::{InteractionFailure, Outcome, VerificationReport};
