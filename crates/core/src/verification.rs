//! Verification outcomes and reports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::matching::Mismatch;
use crate::names::VersionId;
use crate::refs::ContractRef;
use crate::timestamp::Timestamp;

/// Result of running a provider version against a contract revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Every interaction matched
    Success,
    /// At least one interaction did not match
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure => f.write_str("failure"),
        }
    }
}

/// A failed interaction with a human-readable mismatch description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFailure {
    /// Interaction key, `<provider state>::<description>` or the bare description
    pub interaction: String,
    /// What did not match, e.g. "field $.id expected '1' but received '2'"
    pub mismatch: String,
}

/// Verification report as submitted by a provider build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// Verified revision
    pub contract: ContractRef,
    /// Provider version under test
    pub provider_version: VersionId,
    /// Overall result
    pub outcome: Outcome,
    /// Failure details; empty on success
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<InteractionFailure>,
    /// When the verification ran; the broker's clock if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<Timestamp>,
}

impl VerificationReport {
    /// Build a report from per-interaction mismatch lists
    ///
    /// The outcome is success exactly when no interaction has a mismatch.
    pub fn from_mismatches(
        contract: ContractRef,
        provider_version: VersionId,
        results: Vec<(String, Vec<Mismatch>)>,
    ) -> Self {
        let failures: Vec<InteractionFailure> = results
            .into_iter()
            .flat_map(|(interaction, mismatches)| {
                mismatches.into_iter().map(move |m| InteractionFailure {
                    interaction: interaction.clone(),
                    mismatch: m.to_string(),
                })
            })
            .collect();
        let outcome = if failures.is_empty() {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        VerificationReport {
            contract,
            provider_version,
            outcome,
            failures,
            verified_at: None,
        }
    }
}
