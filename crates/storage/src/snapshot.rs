//! Point-in-time read views
//!
//! A [`StoreSnapshot`] pins one commit version and answers every read
//! against it. Nothing is copied: the live stores are filtered by version,
//! so a snapshot is as cheap as an `Arc` clone and a `u64`.
//!
//! Because versions become visible strictly in order, every write with a
//! version at or below the pinned one is fully applied and no later write
//! leaks in. Evaluating a deployment query against one snapshot therefore
//! sees a single consistent state across all stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use accord_core::{
    ContractKey, ContractRef, ParticipantName, TagName, VerificationRef, VersionId,
};

use crate::contracts::ContractRevision;
use crate::stores::Stores;
use crate::verifications::PairKey;

/// Version-bounded view over all stores
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    stores: Arc<Stores>,
    version: u64,
}

impl StoreSnapshot {
    /// Pin `stores` at `version`
    pub fn new(stores: Arc<Stores>, version: u64) -> Self {
        Self { stores, version }
    }

    /// The pinned commit version
    pub fn version(&self) -> u64 {
        self.version
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Check if the participant is known
    pub fn has_participant(&self, participant: &ParticipantName) -> bool {
        self.stores.registry.contains(participant, self.version)
    }

    /// Check if the participant version is known
    pub fn has_version(&self, participant: &ParticipantName, version: &VersionId) -> bool {
        self.stores.registry.has_version(participant, version, self.version)
    }

    /// Versions of a participant, oldest-first
    pub fn versions(&self, participant: &ParticipantName) -> Option<Vec<VersionId>> {
        self.stores.registry.versions(participant, self.version)
    }

    /// All known participants, sorted
    pub fn participants(&self) -> Vec<ParticipantName> {
        self.stores.registry.participants(self.version)
    }

    // ========================================================================
    // Contracts
    // ========================================================================

    /// Current revision of a contract key
    pub fn current(&self, key: &ContractKey) -> Option<ContractRevision> {
        self.stores.contracts.current(key, self.version)
    }

    /// The revision a reference points at
    pub fn resolve(&self, reference: &ContractRef) -> Option<ContractRevision> {
        self.stores.contracts.resolve(reference, self.version)
    }

    /// Every revision of a contract key, oldest-first
    pub fn revisions(&self, key: &ContractKey) -> Vec<ContractRevision> {
        self.stores.contracts.revisions(key, self.version)
    }

    /// Contract keys addressed to a provider, sorted
    pub fn keys_for_provider(&self, provider: &ParticipantName) -> Vec<ContractKey> {
        self.stores.contracts.keys_for_provider(provider, self.version)
    }

    /// Contract keys published by a consumer, sorted
    pub fn keys_for_consumer(&self, consumer: &ParticipantName) -> Vec<ContractKey> {
        self.stores.contracts.keys_for_consumer(consumer, self.version)
    }

    /// Consumers that have published to a provider
    pub fn consumers_of(&self, provider: &ParticipantName) -> BTreeSet<ParticipantName> {
        self.stores.contracts.consumers_of(provider, self.version)
    }

    /// Providers a consumer version has published to
    pub fn providers_of(
        &self,
        consumer: &ParticipantName,
        consumer_version: &VersionId,
    ) -> BTreeSet<ParticipantName> {
        self.stores
            .contracts
            .providers_of(consumer, consumer_version, self.version)
    }

    /// Key of the most recently created consumer version for a pair
    pub fn latest_key_for_pair(
        &self,
        consumer: &ParticipantName,
        provider: &ParticipantName,
    ) -> Option<ContractKey> {
        self.stores
            .contracts
            .latest_key_for_pair(consumer, provider, self.version)
    }

    // ========================================================================
    // Verifications
    // ========================================================================

    /// Authoritative result for a reference and provider version
    pub fn latest_verification(
        &self,
        contract: &ContractRef,
        provider_version: &VersionId,
    ) -> Option<VerificationRef> {
        self.stores
            .verifications
            .latest_for(contract, provider_version, self.version)
    }

    /// Authoritative result for a raw pair key
    pub fn latest_for_pair(&self, pair: &PairKey) -> Option<VerificationRef> {
        self.stores.verifications.latest(pair, self.version)
    }

    /// Every result for a reference and provider version, in insertion order
    pub fn history(&self, contract: &ContractRef, provider_version: &VersionId) -> Vec<VerificationRef> {
        self.stores
            .verifications
            .history(contract, provider_version, self.version)
    }

    /// Provider versions that have verified a revision, sorted
    pub fn verifiers_of(&self, contract: &ContractKey, revision: u32) -> Vec<VersionId> {
        self.stores
            .verifications
            .verifiers_of(contract, revision, self.version)
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Versions of a participant carrying a tag
    pub fn versions_for_tag(&self, participant: &ParticipantName, tag: &TagName) -> BTreeSet<VersionId> {
        self.stores
            .tags
            .versions_for_tag(participant, tag, self.version)
    }

    /// Tags carried by a participant version, sorted
    pub fn tags_for(&self, participant: &ParticipantName, version: &VersionId) -> Vec<TagName> {
        self.stores.tags.tags_for(participant, version, self.version)
    }
}
