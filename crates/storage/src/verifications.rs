//! Verification Recorder
//!
//! Append-only log of verification results per (contract revision,
//! provider version) pair. Nothing is ever overwritten: the authoritative
//! result for a pair is the one with the greatest `verified_at`, and ties
//! go to the most recently recorded entry. Per-pair sequence numbers are
//! assigned under the pair's shard lock, so insertion order is monotonic.

use accord_core::{
    AccordError, ContractKey, ContractRef, Result, Timestamp, VerificationRef, VerificationReport,
    VersionId,
};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use tracing::{info, warn};

use crate::chain::VersionChain;
use crate::contracts::ContractStore;
use crate::stores::WriteContext;
use crate::wal::LogRecord;

/// Key of one verification log
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey {
    /// Contract key
    pub contract: ContractKey,
    /// Revision within the key
    pub revision: u32,
    /// Provider version that verified it
    pub provider_version: VersionId,
}

impl PairKey {
    /// Key for a contract reference and provider version
    pub fn new(contract: &ContractRef, provider_version: &VersionId) -> Self {
        PairKey {
            contract: contract.key(),
            revision: contract.revision,
            provider_version: provider_version.clone(),
        }
    }
}

/// Append-only verification store
#[derive(Debug, Default)]
pub struct VerificationRecorder {
    chains: DashMap<PairKey, VersionChain<VerificationRef>>,
    by_revision: DashMap<(ContractKey, u32), FxHashSet<VersionId>>,
}

impl VerificationRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verification result
    ///
    /// A failure outcome is stored like any other result. Fails with
    /// `UnknownContract` when the referenced revision does not exist.
    /// Recording against a superseded revision succeeds and marks the
    /// result stale.
    pub fn record(
        &self,
        report: VerificationReport,
        contracts: &ContractStore,
        ctx: &WriteContext<'_>,
    ) -> Result<VerificationRef> {
        let key = report.contract.key();
        if contracts.resolve(&report.contract, u64::MAX).is_none() {
            return Err(AccordError::UnknownContract(report.contract.to_string()));
        }
        let stale = contracts
            .current(&key, u64::MAX)
            .map(|c| c.reference.revision != report.contract.revision)
            .unwrap_or(false);
        let verified_at = report.verified_at.unwrap_or_else(Timestamp::now);

        let pair = PairKey::new(&report.contract, &report.provider_version);
        let mut chain = self.chains.entry(pair).or_default();
        let sequence = chain.len() as u64 + 1;

        let logged = VerificationReport {
            verified_at: Some(verified_at),
            ..report
        };
        ctx.wal.append(&LogRecord::Record {
            report: logged.clone(),
        })?;

        let ticket = ctx.clock.begin();
        let verification = VerificationRef {
            contract: logged.contract,
            provider_version: logged.provider_version,
            sequence,
            outcome: logged.outcome,
            verified_at,
            stale,
            failures: logged.failures,
        };
        chain.push(ticket.version(), verification.clone());
        ctx.registry.register(
            &verification.contract.provider,
            Some(&verification.provider_version),
            ticket.version(),
        );
        self.by_revision
            .entry((key, verification.contract.revision))
            .or_default()
            .insert(verification.provider_version.clone());

        drop(chain);
        drop(ticket);

        if stale {
            warn!(
                verification = %verification,
                "verification recorded against a superseded contract revision"
            );
        } else {
            info!(verification = %verification, "recorded verification");
        }
        Ok(verification)
    }

    /// Authoritative result for a reference and provider version at `at`
    ///
    /// Returns `None` when nothing was recorded or when the reference's
    /// content hash does not match the stored revision.
    pub fn latest_for(
        &self,
        contract: &ContractRef,
        provider_version: &VersionId,
        at: u64,
    ) -> Option<VerificationRef> {
        self.latest(&PairKey::new(contract, provider_version), at)
            .filter(|v| v.contract.content_hash == contract.content_hash)
    }

    /// Authoritative result for a pair key at `at`
    pub fn latest(&self, pair: &PairKey, at: u64) -> Option<VerificationRef> {
        self.chains.get(pair).and_then(|chain| {
            chain
                .visible_at(at)
                .iter()
                .map(|e| &e.value)
                .max_by_key(|v| v.recency())
                .cloned()
        })
    }

    /// Every result for a reference and provider version, in insertion order
    pub fn history(
        &self,
        contract: &ContractRef,
        provider_version: &VersionId,
        at: u64,
    ) -> Vec<VerificationRef> {
        self.chains
            .get(&PairKey::new(contract, provider_version))
            .map(|chain| chain.visible_at(at).iter().map(|e| e.value.clone()).collect())
            .unwrap_or_default()
    }

    /// Provider versions that have verified a revision, sorted
    pub fn verifiers_of(&self, contract: &ContractKey, revision: u32, at: u64) -> Vec<VersionId> {
        let candidates: Vec<VersionId> = self
            .by_revision
            .get(&(contract.clone(), revision))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let mut versions: Vec<VersionId> = candidates
            .into_iter()
            .filter(|pv| {
                let pair = PairKey {
                    contract: contract.clone(),
                    revision,
                    provider_version: pv.clone(),
                };
                self.chains
                    .get(&pair)
                    .map(|chain| !chain.visible_at(at).is_empty())
                    .unwrap_or(false)
            })
            .collect();
        versions.sort();
        versions
    }
}
