//! Deployment-safety query and response types
//!
//! A query asks whether `participant` at `version` may be deployed to the
//! environment or branch named by `target_tag`. Queries are transient and
//! never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::names::{ParticipantName, TagName, VersionId};
use crate::refs::ContractRef;
use crate::timestamp::Timestamp;

/// Verdict for a participant with no applicable contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPolicy {
    /// Nothing blocks deployment
    #[default]
    Allow,
    /// No evidence of safety means no
    Deny,
}

/// A `can-i-deploy` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentQuery {
    /// Candidate participant
    pub participant: ParticipantName,
    /// Candidate version
    pub version: VersionId,
    /// Environment or branch tag being deployed to
    pub target_tag: TagName,
    /// Additional tags whose counterparts must also be compatible
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_tags: Vec<TagName>,
    /// Overrides the configured empty-set policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_policy: Option<EmptyPolicy>,
}

impl DeploymentQuery {
    /// Query with default options
    pub fn new(participant: ParticipantName, version: VersionId, target_tag: TagName) -> Self {
        DeploymentQuery {
            participant,
            version,
            target_tag,
            extra_tags: Vec::new(),
            empty_policy: None,
        }
    }

    /// Override the empty-set policy for this query
    pub fn with_empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty_policy = Some(policy);
        self
    }

    /// Require compatibility with an additional tag
    pub fn also_require(mut self, tag: TagName) -> Self {
        self.extra_tags.push(tag);
        self
    }
}

/// Overall answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Safe to deploy
    Yes,
    /// At least one requirement is unsatisfied
    No,
    /// The stores could not be read
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Yes => f.write_str("yes"),
            Verdict::No => f.write_str("no"),
            Verdict::Unknown => f.write_str("unknown"),
        }
    }
}

/// Why a requirement is not satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reason {
    /// Nothing recorded for the revision and provider version
    NoVerification,
    /// The latest result for the pair is a failure
    VerificationFailed,
    /// Only older, superseded revisions were verified
    SupersededRevision,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NoVerification => f.write_str("no verification found"),
            Reason::VerificationFailed => f.write_str("latest verification failed"),
            Reason::SupersededRevision => {
                f.write_str("verification is for a superseded contract revision")
            }
        }
    }
}

/// A requirement that holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Satisfied {
    /// Current contract revision
    pub contract: ContractRef,
    /// Provider version whose verification satisfies it
    pub provider_version: VersionId,
    /// Tag that made the requirement applicable
    pub tag: TagName,
    /// When the authoritative verification ran
    pub verified_at: Timestamp,
}

/// A requirement that does not hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unsatisfied {
    /// Current contract revision
    pub contract: ContractRef,
    /// Provider version that must have verified it
    pub provider_version: VersionId,
    /// Tag that made the requirement applicable
    pub tag: TagName,
    /// Why it fails
    pub reason: Reason,
}

impl fmt::Display for Unsatisfied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} with {} {} [{}]: {}",
            self.contract, self.contract.provider, self.provider_version, self.tag, self.reason
        )
    }
}

/// Answer to a [`DeploymentQuery`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResponse {
    /// Overall verdict
    pub verdict: Verdict,
    /// Failing requirements
    pub unsatisfied: Vec<Unsatisfied>,
    /// Holding requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub satisfied: Vec<Satisfied>,
    /// Why the query could not be answered normally: a store failure
    /// (verdict `Unknown`) or an unknown candidate version (verdict `No`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentResponse {
    /// Response for a query that could not be evaluated
    pub fn unknown(message: impl Into<String>) -> Self {
        DeploymentResponse {
            verdict: Verdict::Unknown,
            unsatisfied: Vec::new(),
            satisfied: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// True only for a definite yes
    pub fn is_deployable(&self) -> bool {
        self.verdict == Verdict::Yes
    }
}
