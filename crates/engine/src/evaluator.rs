//! Compatibility evaluator
//!
//! Answers "may `participant` deploy `version` as `tag`?" against one
//! store snapshot. A participant is checked in both roles:
//!
//! - as a provider, against the current contract revision of every
//!   consumer version carrying a relevant tag
//! - as a consumer, against every provider version carrying a relevant
//!   tag, for each current revision this version published
//!
//! Each check passes only when the latest verification of that exact
//! revision by that provider version succeeded. The verdict is `Yes` when
//! every check passes and at least one applies; an empty set of checks
//! falls back to the empty-set policy. A known participant queried with a
//! version it never published, verified or tagged is answered `No` with an
//! `UnknownVersion` error instead.

use std::collections::BTreeSet;

use accord_core::{
    AccordError, ContractKey, ContractRef, DeploymentQuery, DeploymentResponse, EmptyPolicy, Outcome,
    ParticipantName, Reason, Satisfied, TagName, Timestamp, Unsatisfied, Verdict, VersionId,
};
use accord_storage::StoreSnapshot;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broker::config::BrokerConfig;

/// One row of the compatibility matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    /// Current contract revision
    pub contract: ContractRef,
    /// Tags on the consumer version
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumer_tags: Vec<TagName>,
    /// Provider version that verified the revision
    pub provider_version: VersionId,
    /// Tags on the provider version
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_tags: Vec<TagName>,
    /// Latest outcome for the pair
    pub outcome: Outcome,
    /// When the latest verification ran
    pub verified_at: Timestamp,
}

/// Read-only evaluator over one snapshot
pub struct Evaluator<'a> {
    snapshot: &'a StoreSnapshot,
    config: &'a BrokerConfig,
}

/// Accumulates checks, skipping (revision, provider version) duplicates
#[derive(Default)]
struct Checks {
    seen: BTreeSet<(ContractKey, u32, VersionId)>,
    satisfied: Vec<Satisfied>,
    unsatisfied: Vec<Unsatisfied>,
}

impl Checks {
    fn applicable(&self) -> usize {
        self.satisfied.len() + self.unsatisfied.len()
    }
}

impl<'a> Evaluator<'a> {
    /// Evaluator reading `snapshot` under `config`
    pub fn new(snapshot: &'a StoreSnapshot, config: &'a BrokerConfig) -> Self {
        Self { snapshot, config }
    }

    /// Decide a deployment query
    pub fn can_i_deploy(&self, query: &DeploymentQuery) -> DeploymentResponse {
        let tags = self.relevant_tags(query);
        let mut checks = Checks::default();

        self.check_as_provider(&query.participant, &query.version, &tags, &mut checks);
        self.check_as_consumer(&query.participant, &query.version, &tags, &mut checks);

        let mut error = None;
        let verdict = if checks.applicable() == 0 {
            if self.snapshot.has_participant(&query.participant)
                && !self.snapshot.has_version(&query.participant, &query.version)
            {
                error = Some(
                    AccordError::unknown_version(&query.participant, &query.version).to_string(),
                );
                Verdict::No
            } else {
                match query.empty_policy.unwrap_or(self.config.empty_policy) {
                    EmptyPolicy::Allow => Verdict::Yes,
                    EmptyPolicy::Deny => Verdict::No,
                }
            }
        } else if checks.unsatisfied.is_empty() {
            Verdict::Yes
        } else {
            Verdict::No
        };

        debug!(
            participant = %query.participant,
            version = %query.version,
            target = %query.target_tag,
            snapshot = self.snapshot.version(),
            applicable = checks.applicable(),
            unsatisfied = checks.unsatisfied.len(),
            %verdict,
            "evaluated deployment"
        );

        DeploymentResponse {
            verdict,
            unsatisfied: checks.unsatisfied,
            satisfied: checks.satisfied,
            error,
        }
    }

    /// Every provider version that verified a current contract between the pair
    pub fn matrix(&self, consumer: &ParticipantName, provider: &ParticipantName) -> Vec<MatrixRow> {
        let mut rows = Vec::new();
        for key in self.snapshot.keys_for_consumer(consumer) {
            if &key.provider != provider {
                continue;
            }
            let current = match self.snapshot.current(&key) {
                Some(current) => current.reference,
                None => continue,
            };
            let consumer_tags = self.snapshot.tags_for(consumer, &key.consumer_version);
            for provider_version in self.snapshot.verifiers_of(&key, current.revision) {
                if let Some(latest) = self.snapshot.latest_verification(&current, &provider_version) {
                    rows.push(MatrixRow {
                        contract: current.clone(),
                        consumer_tags: consumer_tags.clone(),
                        provider_tags: self.snapshot.tags_for(provider, &provider_version),
                        provider_version,
                        outcome: latest.outcome,
                        verified_at: latest.verified_at,
                    });
                }
            }
        }
        rows
    }

    /// Target tag, then configured tags, then query extras, without repeats
    fn relevant_tags(&self, query: &DeploymentQuery) -> Vec<TagName> {
        let mut tags: Vec<TagName> = Vec::new();
        let candidates = std::iter::once(&query.target_tag)
            .chain(self.config.required_tags.iter())
            .chain(query.extra_tags.iter());
        for tag in candidates {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    fn check_as_provider(
        &self,
        provider: &ParticipantName,
        provider_version: &VersionId,
        tags: &[TagName],
        checks: &mut Checks,
    ) {
        for consumer in self.snapshot.consumers_of(provider) {
            for tag in tags {
                for consumer_version in self.snapshot.versions_for_tag(&consumer, tag) {
                    let key = ContractKey::new(consumer.clone(), consumer_version, provider.clone());
                    if let Some(current) = self.snapshot.current(&key) {
                        self.check(&current.reference, provider_version, tag, checks);
                    }
                }
            }
        }
    }

    fn check_as_consumer(
        &self,
        consumer: &ParticipantName,
        consumer_version: &VersionId,
        tags: &[TagName],
        checks: &mut Checks,
    ) {
        for provider in self.snapshot.providers_of(consumer, consumer_version) {
            let key = ContractKey::new(consumer.clone(), consumer_version.clone(), provider.clone());
            let current = match self.snapshot.current(&key) {
                Some(current) => current.reference,
                None => continue,
            };
            for tag in tags {
                for provider_version in self.snapshot.versions_for_tag(&provider, tag) {
                    self.check(&current, &provider_version, tag, checks);
                }
            }
        }
    }

    /// Check one (current revision, provider version) requirement
    fn check(&self, contract: &ContractRef, provider_version: &VersionId, tag: &TagName, checks: &mut Checks) {
        let seen = (contract.key(), contract.revision, provider_version.clone());
        if !checks.seen.insert(seen) {
            return;
        }

        let reason = match self.snapshot.latest_verification(contract, provider_version) {
            Some(latest) if latest.is_success() => {
                checks.satisfied.push(Satisfied {
                    contract: contract.clone(),
                    provider_version: provider_version.clone(),
                    tag: tag.clone(),
                    verified_at: latest.verified_at,
                });
                return;
            }
            Some(_) => Reason::VerificationFailed,
            None if self.verified_older_revision(contract, provider_version) => {
                Reason::SupersededRevision
            }
            None => Reason::NoVerification,
        };

        debug!(contract = %contract, %provider_version, %tag, %reason, "requirement not satisfied");
        checks.unsatisfied.push(Unsatisfied {
            contract: contract.clone(),
            provider_version: provider_version.clone(),
            tag: tag.clone(),
            reason,
        });
    }

    fn verified_older_revision(&self, contract: &ContractRef, provider_version: &VersionId) -> bool {
        self.snapshot
            .revisions(&contract.key())
            .iter()
            .filter(|r| r.reference.revision < contract.revision)
            .any(|r| {
                self.snapshot
                    .latest_verification(&r.reference, provider_version)
                    .is_some()
            })
    }
}
