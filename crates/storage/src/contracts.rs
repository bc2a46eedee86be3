//! Contract Store
//!
//! Immutable contract revisions, keyed by (consumer, consumer version,
//! provider). Each key owns an append-only revision chain: republishing
//! identical interactions returns the current revision, republishing
//! different interactions appends revision `n + 1`, which supersedes
//! revision `n` for every later lookup.
//!
//! # Thread Safety
//!
//! - publish(): locks only the target key's shard for the duration of the
//!   idempotence check, the write-ahead append and the chain push
//! - reads: shard read locks, filtered by snapshot version

use std::collections::BTreeSet;

use accord_core::{
    validate_interactions, AccordError, ContentHash, ContractDocument, ContractKey, ContractRef,
    ParticipantName, Result, Timestamp, VersionId,
};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::chain::VersionChain;
use crate::stores::WriteContext;
use crate::wal::LogRecord;

/// One stored revision
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRevision {
    /// Reference returned to publishers
    pub reference: ContractRef,
    /// Document as published
    pub document: ContractDocument,
    /// Broker time of the publish
    pub published_at: Timestamp,
}

/// Result of a publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    /// Current revision after the publish
    pub reference: ContractRef,
    /// False when the content was identical to the current revision
    pub created: bool,
}

/// Append-only contract revision store
#[derive(Debug, Default)]
pub struct ContractStore {
    chains: DashMap<ContractKey, VersionChain<ContractRevision>>,
    by_provider: DashMap<ParticipantName, FxHashSet<ContractKey>>,
    by_consumer: DashMap<ParticipantName, FxHashSet<ContractKey>>,
}

impl ContractStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a document for `consumer_version`
    ///
    /// Fails with `InvalidContract` before anything is stored when the
    /// interactions are structurally invalid.
    pub fn publish(
        &self,
        consumer_version: &VersionId,
        document: ContractDocument,
        published_at: Timestamp,
        ctx: &WriteContext<'_>,
    ) -> Result<PublishOutcome> {
        validate_interactions(&document.interactions)?;
        let content_hash = ContentHash::of(&document.interactions)?;
        let key = ContractKey::new(
            document.consumer.name.clone(),
            consumer_version.clone(),
            document.provider.name.clone(),
        );

        let mut chain = self.chains.entry(key.clone()).or_default();
        if let Some(current) = chain.latest() {
            if current.value.reference.content_hash == content_hash {
                debug!(contract = %current.value.reference, "identical republish, keeping current revision");
                return Ok(PublishOutcome {
                    reference: current.value.reference.clone(),
                    created: false,
                });
            }
        }

        let revision = u32::try_from(chain.len() + 1)
            .map_err(|_| AccordError::invalid_contract(format!("too many revisions for {}", key)))?;
        ctx.wal.append(&LogRecord::Publish {
            consumer_version: consumer_version.clone(),
            document: document.clone(),
            published_at,
        })?;

        let ticket = ctx.clock.begin();
        let reference = ContractRef {
            consumer: key.consumer.clone(),
            consumer_version: key.consumer_version.clone(),
            provider: key.provider.clone(),
            revision,
            content_hash,
        };
        chain.push(
            ticket.version(),
            ContractRevision {
                reference: reference.clone(),
                document,
                published_at,
            },
        );
        ctx.registry
            .register(&key.consumer, Some(&key.consumer_version), ticket.version());
        ctx.registry.register(&key.provider, None, ticket.version());
        self.by_provider
            .entry(key.provider.clone())
            .or_default()
            .insert(key.clone());
        self.by_consumer
            .entry(key.consumer.clone())
            .or_default()
            .insert(key);

        // release the shard before publishing the commit
        drop(chain);
        drop(ticket);

        if revision > 1 {
            info!(contract = %reference, "published contract revision, superseding r{}", revision - 1);
        } else {
            info!(contract = %reference, "published contract");
        }
        Ok(PublishOutcome {
            reference,
            created: true,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current revision of `key` at `at`
    pub fn current(&self, key: &ContractKey, at: u64) -> Option<ContractRevision> {
        self.chains
            .get(key)
            .and_then(|chain| chain.latest_at(at).map(|e| e.value.clone()))
    }

    /// A specific revision of `key` at `at`
    pub fn revision(&self, key: &ContractKey, revision: u32, at: u64) -> Option<ContractRevision> {
        self.chains.get(key).and_then(|chain| {
            chain
                .visible_at(at)
                .iter()
                .find(|e| e.value.reference.revision == revision)
                .map(|e| e.value.clone())
        })
    }

    /// The revision a reference points at, if the hash also matches
    pub fn resolve(&self, reference: &ContractRef, at: u64) -> Option<ContractRevision> {
        self.revision(&reference.key(), reference.revision, at)
            .filter(|r| r.reference.content_hash == reference.content_hash)
    }

    /// Every revision of `key` at `at`, oldest-first
    pub fn revisions(&self, key: &ContractKey, at: u64) -> Vec<ContractRevision> {
        self.chains
            .get(key)
            .map(|chain| chain.visible_at(at).iter().map(|e| e.value.clone()).collect())
            .unwrap_or_default()
    }

    /// Commit of the first revision of `key`, if visible at `at`
    pub fn created_at(&self, key: &ContractKey, at: u64) -> Option<u64> {
        self.chains
            .get(key)
            .and_then(|chain| chain.first_at(at).map(|e| e.commit))
    }

    /// Contract keys addressed to `provider`, sorted
    pub fn keys_for_provider(&self, provider: &ParticipantName, at: u64) -> Vec<ContractKey> {
        let candidates: Vec<ContractKey> = self
            .by_provider
            .get(provider)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        self.visible_sorted(candidates, at)
    }

    /// Contract keys published by `consumer`, sorted
    pub fn keys_for_consumer(&self, consumer: &ParticipantName, at: u64) -> Vec<ContractKey> {
        let candidates: Vec<ContractKey> = self
            .by_consumer
            .get(consumer)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        self.visible_sorted(candidates, at)
    }

    /// Consumers that have published to `provider`
    pub fn consumers_of(&self, provider: &ParticipantName, at: u64) -> BTreeSet<ParticipantName> {
        self.keys_for_provider(provider, at)
            .into_iter()
            .map(|k| k.consumer)
            .collect()
    }

    /// Providers a consumer version has published to
    pub fn providers_of(
        &self,
        consumer: &ParticipantName,
        consumer_version: &VersionId,
        at: u64,
    ) -> BTreeSet<ParticipantName> {
        self.keys_for_consumer(consumer, at)
            .into_iter()
            .filter(|k| &k.consumer_version == consumer_version)
            .map(|k| k.provider)
            .collect()
    }

    /// Key of the most recently created consumer version for a pair
    pub fn latest_key_for_pair(
        &self,
        consumer: &ParticipantName,
        provider: &ParticipantName,
        at: u64,
    ) -> Option<ContractKey> {
        self.keys_for_consumer(consumer, at)
            .into_iter()
            .filter(|k| &k.provider == provider)
            .filter_map(|k| self.created_at(&k, at).map(|c| (c, k)))
            .max_by_key(|(c, _)| *c)
            .map(|(_, k)| k)
    }

    fn visible_sorted(&self, candidates: Vec<ContractKey>, at: u64) -> Vec<ContractKey> {
        let mut keys: Vec<ContractKey> = candidates
            .into_iter()
            .filter(|k| self.created_at(k, at).is_some())
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::Stores;
    use crate::wal::NoWal;
    use accord_core::{HttpMethod, Interaction, RequestMatcher, ResponseMatcher};

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    fn ver(s: &str) -> VersionId {
        VersionId::new(s).unwrap()
    }

    fn doc(status: u16) -> ContractDocument {
        ContractDocument::new(
            name("web"),
            name("orders"),
            vec![Interaction::new(
                "list orders",
                RequestMatcher::new(HttpMethod::Get, "/orders"),
                ResponseMatcher::status(status),
            )],
        )
    }

    #[test]
    fn test_identical_republish_is_idempotent() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        let first = stores.contracts.publish(&ver("1"), doc(200), Timestamp::now(), &ctx).unwrap();
        let second = stores.contracts.publish(&ver("1"), doc(200), Timestamp::now(), &ctx).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.reference, second.reference);
        assert_eq!(stores.contracts.revisions(&first.reference.key(), u64::MAX).len(), 1);
        assert_eq!(stores.clock.visible(), 1);
    }

    #[test]
    fn test_changed_content_appends_revision() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        let r1 = stores.contracts.publish(&ver("1"), doc(200), Timestamp::now(), &ctx).unwrap();
        let r2 = stores.contracts.publish(&ver("1"), doc(201), Timestamp::now(), &ctx).unwrap();

        assert_eq!(r1.reference.revision, 1);
        assert_eq!(r2.reference.revision, 2);
        let key = r1.reference.key();
        assert_eq!(stores.contracts.current(&key, u64::MAX).unwrap().reference, r2.reference);
        // the old revision is still visible to a snapshot taken before the republish
        assert_eq!(stores.contracts.current(&key, 1).unwrap().reference, r1.reference);
        assert_eq!(stores.contracts.revisions(&key, u64::MAX).len(), 2);
    }

    #[test]
    fn test_empty_contract_rejected_without_side_effects() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        let empty = ContractDocument::new(name("web"), name("orders"), vec![]);
        let err = stores.contracts.publish(&ver("1"), empty, Timestamp::now(), &ctx).unwrap_err();
        assert!(matches!(err, AccordError::InvalidContract(_)));
        assert_eq!(stores.clock.visible(), 0);
        assert!(stores.contracts.keys_for_provider(&name("orders"), u64::MAX).is_empty());
    }

    #[test]
    fn test_resolve_checks_hash() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        let r1 = stores.contracts.publish(&ver("1"), doc(200), Timestamp::now(), &ctx).unwrap();
        assert!(stores.contracts.resolve(&r1.reference, u64::MAX).is_some());

        let other = stores.contracts.publish(&ver("2"), doc(204), Timestamp::now(), &ctx).unwrap();
        let mut forged = r1.reference.clone();
        forged.content_hash = other.reference.content_hash;
        assert!(stores.contracts.resolve(&forged, u64::MAX).is_none());
    }

    #[test]
    fn test_indexes_and_latest_key() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        stores.contracts.publish(&ver("1"), doc(200), Timestamp::now(), &ctx).unwrap();
        stores.contracts.publish(&ver("2"), doc(200), Timestamp::now(), &ctx).unwrap();

        assert_eq!(stores.contracts.keys_for_provider(&name("orders"), u64::MAX).len(), 2);
        assert_eq!(
            stores.contracts.consumers_of(&name("orders"), u64::MAX).into_iter().collect::<Vec<_>>(),
            vec![name("web")]
        );
        assert!(stores.contracts.providers_of(&name("web"), &ver("1"), u64::MAX).contains(&name("orders")));
        let latest = stores
            .contracts
            .latest_key_for_pair(&name("web"), &name("orders"), u64::MAX)
            .unwrap();
        assert_eq!(latest.consumer_version, ver("2"));
        let earlier = stores
            .contracts
            .latest_key_for_pair(&name("web"), &name("orders"), 1)
            .unwrap();
        assert_eq!(earlier.consumer_version, ver("1"));
    }
}
