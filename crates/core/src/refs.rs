//! Stable references to stored contracts and verifications

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::contract::ContentHash;
use crate::names::{ParticipantName, VersionId};
use crate::timestamp::Timestamp;
use crate::verification::{InteractionFailure, Outcome};

/// Identity of a contract independent of its revisions
///
/// A (consumer, consumer version, provider) triple owns an append-only
/// list of revisions. At most one revision is current.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractKey {
    /// Publishing consumer
    pub consumer: ParticipantName,
    /// Consumer version that produced the contract
    pub consumer_version: VersionId,
    /// Provider the expectations are addressed to
    pub provider: ParticipantName,
}

impl ContractKey {
    /// Build a key
    pub fn new(consumer: ParticipantName, consumer_version: VersionId, provider: ParticipantName) -> Self {
        ContractKey {
            consumer,
            consumer_version,
            provider,
        }
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}->{}", self.consumer, self.consumer_version, self.provider)
    }
}

/// Reference to one immutable contract revision
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRef {
    /// Publishing consumer
    pub consumer: ParticipantName,
    /// Consumer version that produced the contract
    pub consumer_version: VersionId,
    /// Provider the expectations are addressed to
    pub provider: ParticipantName,
    /// Revision number, starting at 1
    pub revision: u32,
    /// Hash of the revision's interactions
    pub content_hash: ContentHash,
}

impl ContractRef {
    /// The revision-independent key
    pub fn key(&self) -> ContractKey {
        ContractKey {
            consumer: self.consumer.clone(),
            consumer_version: self.consumer_version.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}->{}#r{}",
            self.consumer, self.consumer_version, self.provider, self.revision
        )
    }
}

/// One recorded verification result
///
/// Results are never mutated. For a (revision, provider version) pair the
/// authoritative result is the one with the greatest `verified_at`, ties
/// broken by the greater `sequence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRef {
    /// Verified revision
    pub contract: ContractRef,
    /// Provider version that ran the verification
    pub provider_version: VersionId,
    /// Insertion order within the (revision, provider version) pair, from 1
    pub sequence: u64,
    /// Result
    pub outcome: Outcome,
    /// When the verification ran
    pub verified_at: Timestamp,
    /// The revision had already been superseded when this was recorded
    pub stale: bool,
    /// Per-interaction failure details
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<InteractionFailure>,
}

impl VerificationRef {
    /// Ordering key for "latest" selection
    #[inline]
    pub fn recency(&self) -> (Timestamp, u64) {
        (self.verified_at, self.sequence)
    }

    /// True when the outcome is success
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

impl fmt::Display for VerificationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} verified by {} #{} ({})",
            self.contract, self.provider_version, self.sequence, self.outcome
        )
    }
}
