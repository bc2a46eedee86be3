//! Broker façade
//!
//! The [`Broker`] owns the stores, the journal and the configuration.
//! Every write and query in Accord goes through it.
//!
//! # Lifecycle
//!
//! - [`Broker::ephemeral`]: in-memory only, nothing survives the process
//! - [`Broker::open`]: durable broker on a data directory. Loads (or
//!   creates) `accord.toml`, locks the directory, replays `journal.jsonl`
//! - [`Broker::shutdown`]: syncs and closes the journal; every later
//!   operation fails with `StoreUnavailable` and `can_i_deploy` answers
//!   `Unknown`
//!
//! # Consistency
//!
//! Multi-store reads (`can_i_deploy`, `matrix`) run against one
//! [`StoreSnapshot`], so a concurrent publish or tag move is either fully
//! visible to a query or not at all.

pub mod config;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use accord_core::{
    AccordError, ContractDocument, ContractKey, ContractRef, DeploymentQuery, DeploymentResponse,
    Interaction, InteractionFailure, Mismatch, ObservedResponse, Outcome, ParticipantName, Result,
    TagName, Timestamp, VerificationRef, VerificationReport, VersionId,
};
use accord_storage::{
    ContractRevision, NoWal, PublishOutcome, StoreSnapshot, Stores, TagChange, WriteAhead,
    WriteContext,
};
use tracing::{info, warn};

use crate::evaluator::{Evaluator, MatrixRow};
use crate::journal::{Journal, JOURNAL_FILE_NAME};
use crate::replay::replay;
use config::{BrokerConfig, CONFIG_FILE_NAME};

/// Lock file preventing two processes from opening one data directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Which consumer version's contract to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractSelector {
    /// A specific consumer version
    Version(VersionId),
    /// The consumer version currently carrying a tag
    Tagged(TagName),
    /// The most recently created consumer version for the provider
    Latest,
}

impl fmt::Display for ContractSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractSelector::Version(v) => write!(f, "version {}", v),
            ContractSelector::Tagged(t) => write!(f, "tag {}", t),
            ContractSelector::Latest => f.write_str("latest version"),
        }
    }
}

/// The contract broker
pub struct Broker {
    stores: Arc<Stores>,
    /// `None` for ephemeral brokers
    journal: Option<Journal>,
    config: BrokerConfig,
    data_dir: Option<PathBuf>,
    /// Cleared by `shutdown`
    accepting: AtomicBool,
    /// Held for the broker's lifetime; dropping it releases the directory
    _lock: Option<File>,
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broker")
            .field("data_dir", &self.data_dir)
            .field("config", &self.config)
            .field("version", &self.stores.clock.visible())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Broker {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// In-memory broker with the given configuration
    pub fn ephemeral(config: BrokerConfig) -> Self {
        Broker {
            stores: Arc::new(Stores::new()),
            journal: None,
            config,
            data_dir: None,
            accepting: AtomicBool::new(true),
            _lock: None,
        }
    }

    /// Open a durable broker on `path`
    ///
    /// Creates the directory and a default `accord.toml` when missing,
    /// then rebuilds state from the journal.
    ///
    /// # Errors
    ///
    /// - `Config` when `accord.toml` cannot be read or parsed
    /// - `StoreUnavailable` when the directory is in use by another
    ///   process or cannot be written
    /// - `Corruption` when the journal cannot be replayed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            AccordError::unavailable(format!(
                "failed to create data directory '{}': {}",
                data_dir.display(),
                e
            ))
        })?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        BrokerConfig::write_default_if_missing(&config_path)?;
        let config = BrokerConfig::from_file(&config_path)?;

        Self::open_with_config(data_dir, config)
    }

    /// Open a durable broker on `path` with an explicit configuration
    ///
    /// The configuration is not written back to `accord.toml`.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: BrokerConfig) -> Result<Self> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let lock_path = data_dir.join(LOCK_FILE_NAME);
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| AccordError::unavailable(format!("failed to open lock file: {}", e)))?;
        fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
            AccordError::unavailable(format!(
                "data directory '{}' is already in use by another broker",
                data_dir.display()
            ))
        })?;

        let (journal, records) = Journal::open(&data_dir.join(JOURNAL_FILE_NAME), config.journal_sync)?;
        let stores = Arc::new(Stores::new());
        replay(&stores, records)?;

        info!(
            data_dir = %data_dir.display(),
            version = stores.clock.visible(),
            "opened broker"
        );
        Ok(Broker {
            stores,
            journal: Some(journal),
            config,
            data_dir: Some(data_dir),
            accepting: AtomicBool::new(true),
            _lock: Some(lock_file),
        })
    }

    /// Stop accepting operations and close the journal
    ///
    /// Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        if !self.accepting.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(journal) = &self.journal {
            journal.close()?;
        }
        info!(version = self.stores.clock.visible(), "broker shut down");
        Ok(())
    }

    /// Check if the broker still accepts operations
    pub fn is_open(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Active configuration
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Data directory, `None` for ephemeral brokers
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Consistent read view of every store
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        self.check_open()?;
        Ok(self.stores.snapshot())
    }

    fn check_open(&self) -> Result<()> {
        if !self.is_open() {
            return Err(AccordError::unavailable("broker is shut down"));
        }
        Ok(())
    }

    fn write_context(&self) -> WriteContext<'_> {
        let wal: &dyn WriteAhead = match &self.journal {
            Some(journal) => journal,
            None => &NoWal,
        };
        self.stores.write_context(wal)
    }

    // ========================================================================
    // Contracts
    // ========================================================================

    /// Publish interactions from `consumer` at `consumer_version` to `provider`
    ///
    /// Republishing identical interactions returns the existing reference.
    pub fn publish(
        &self,
        consumer: ParticipantName,
        consumer_version: VersionId,
        provider: ParticipantName,
        interactions: Vec<Interaction>,
    ) -> Result<ContractRef> {
        let document = ContractDocument::new(consumer, provider, interactions);
        Ok(self.publish_document(&consumer_version, document, &[])?.reference)
    }

    /// Publish a parsed contract document and tag the consumer version
    ///
    /// Tags are applied after the contract is stored, even when the
    /// publish was an identical republish.
    ///
    /// # Errors
    ///
    /// The publish and each tag commit separately. When a tag fails, the
    /// contract and the tags before it stay applied and the failure is
    /// logged with the applied tags. Publish and tag are both idempotent,
    /// so the whole call can be retried.
    pub fn publish_document(
        &self,
        consumer_version: &VersionId,
        document: ContractDocument,
        tags: &[TagName],
    ) -> Result<PublishOutcome> {
        self.check_open()?;
        let consumer = document.consumer.name.clone();
        let ctx = self.write_context();
        let outcome = self
            .stores
            .contracts
            .publish(consumer_version, document, Timestamp::now(), &ctx)?;
        for (applied, tag) in tags.iter().enumerate() {
            if let Err(e) = self.stores.tags.tag(&consumer, consumer_version, tag, &ctx) {
                warn!(
                    contract = %outcome.reference,
                    applied = ?&tags[..applied],
                    failed = %tag,
                    error = %e,
                    "contract published but tagging stopped"
                );
                return Err(e);
            }
        }
        Ok(outcome)
    }

    /// Current contract between a provider and a selected consumer version
    ///
    /// # Errors
    ///
    /// `NotFound` when no consumer version matches the selector or it has
    /// no contract with the provider.
    pub fn get(
        &self,
        provider: &ParticipantName,
        consumer: &ParticipantName,
        selector: &ContractSelector,
    ) -> Result<ContractRef> {
        let snapshot = self.snapshot()?;
        let consumer_version = match selector {
            ContractSelector::Version(version) => Some(version.clone()),
            ContractSelector::Tagged(tag) => {
                snapshot.versions_for_tag(consumer, tag).into_iter().next()
            }
            ContractSelector::Latest => snapshot
                .latest_key_for_pair(consumer, provider)
                .map(|key| key.consumer_version),
        };
        consumer_version
            .map(|version| ContractKey::new(consumer.clone(), version, provider.clone()))
            .and_then(|key| snapshot.current(&key))
            .map(|revision| revision.reference)
            .ok_or_else(|| {
                AccordError::not_found(format!(
                    "no contract from {} ({}) for {}",
                    consumer, selector, provider
                ))
            })
    }

    /// The document stored for a revision
    pub fn document(&self, contract: &ContractRef) -> Result<ContractDocument> {
        self.snapshot()?
            .resolve(contract)
            .map(|revision| revision.document)
            .ok_or_else(|| AccordError::UnknownContract(contract.to_string()))
    }

    /// Every revision published under one key, oldest-first
    pub fn revisions(
        &self,
        consumer: &ParticipantName,
        consumer_version: &VersionId,
        provider: &ParticipantName,
    ) -> Result<Vec<ContractRevision>> {
        let key = ContractKey::new(
            consumer.clone(),
            consumer_version.clone(),
            provider.clone(),
        );
        Ok(self.snapshot()?.revisions(&key))
    }

    /// Consumers that have published to `provider`
    pub fn consumers_of(&self, provider: &ParticipantName) -> Result<BTreeSet<ParticipantName>> {
        Ok(self.snapshot()?.consumers_of(provider))
    }

    /// Providers `consumer` at `consumer_version` has published to
    pub fn providers_of(
        &self,
        consumer: &ParticipantName,
        consumer_version: &VersionId,
    ) -> Result<BTreeSet<ParticipantName>> {
        Ok(self.snapshot()?.providers_of(consumer, consumer_version))
    }

    // ========================================================================
    // Verifications
    // ========================================================================

    /// Record a verification of `contract` by `provider_version`
    ///
    /// A failure outcome is recorded, not returned as an error.
    pub fn record(
        &self,
        contract: &ContractRef,
        provider_version: VersionId,
        outcome: Outcome,
        failures: Vec<InteractionFailure>,
    ) -> Result<VerificationRef> {
        self.record_report(VerificationReport {
            contract: contract.clone(),
            provider_version,
            outcome,
            failures,
            verified_at: None,
        })
    }

    /// Record a verification report as submitted by a provider build
    pub fn record_report(&self, report: VerificationReport) -> Result<VerificationRef> {
        self.check_open()?;
        let ctx = self.write_context();
        self.stores
            .verifications
            .record(report, &self.stores.contracts, &ctx)
    }

    /// Authoritative result for a revision and provider version
    pub fn latest_for(
        &self,
        contract: &ContractRef,
        provider_version: &VersionId,
    ) -> Result<Option<VerificationRef>> {
        Ok(self.snapshot()?.latest_verification(contract, provider_version))
    }

    /// Every result for a revision and provider version, oldest-first
    pub fn history(
        &self,
        contract: &ContractRef,
        provider_version: &VersionId,
    ) -> Result<Vec<VerificationRef>> {
        Ok(self.snapshot()?.history(contract, provider_version))
    }

    /// Compare an observed response with one interaction's expectation
    pub fn verify_interaction(
        &self,
        interaction: &Interaction,
        observed: &ObservedResponse,
    ) -> Vec<Mismatch> {
        interaction.verify(observed)
    }

    /// Build a report for a revision from observed responses
    ///
    /// `observed` maps interaction keys (see [`Interaction::key`]) to the
    /// provider's actual responses, so interactions sharing a description
    /// under different provider states are told apart. An interaction with
    /// no observed response fails. The report is returned, not recorded.
    pub fn verify_contract(
        &self,
        contract: &ContractRef,
        provider_version: VersionId,
        observed: &BTreeMap<String, ObservedResponse>,
    ) -> Result<VerificationReport> {
        let document = self.document(contract)?;
        let results = document
            .interactions
            .iter()
            .map(|interaction| {
                let key = interaction.key();
                let mismatches = match observed.get(&key) {
                    Some(response) => self.verify_interaction(interaction, response),
                    None => vec![Mismatch {
                        location: "response".to_string(),
                        expected: "an observed response".to_string(),
                        actual: "nothing".to_string(),
                    }],
                };
                (key, mismatches)
            })
            .collect();
        Ok(VerificationReport::from_mismatches(
            contract.clone(),
            provider_version,
            results,
        ))
    }

    // ========================================================================
    // Tags
    // ========================================================================

    /// Point `tag` at `version` of `participant`
    pub fn tag(
        &self,
        participant: &ParticipantName,
        version: &VersionId,
        tag: &TagName,
    ) -> Result<TagChange> {
        self.check_open()?;
        self.stores
            .tags
            .tag(participant, version, tag, &self.write_context())
    }

    /// Remove `tag` from `participant`
    pub fn untag(&self, participant: &ParticipantName, tag: &TagName) -> Result<TagChange> {
        self.check_open()?;
        self.stores.tags.untag(participant, tag, &self.write_context())
    }

    /// Versions of `participant` carrying `tag`
    pub fn versions_for_tag(
        &self,
        participant: &ParticipantName,
        tag: &TagName,
    ) -> Result<BTreeSet<VersionId>> {
        Ok(self.snapshot()?.versions_for_tag(participant, tag))
    }

    /// Tags currently on `version` of `participant`
    pub fn tags_for(&self, participant: &ParticipantName, version: &VersionId) -> Result<Vec<TagName>> {
        Ok(self.snapshot()?.tags_for(participant, version))
    }

    // ========================================================================
    // Participants
    // ========================================================================

    /// All known participants, sorted
    pub fn participants(&self) -> Result<Vec<ParticipantName>> {
        Ok(self.snapshot()?.participants())
    }

    /// Versions of `participant`, oldest-first
    pub fn versions(&self, participant: &ParticipantName) -> Result<Vec<VersionId>> {
        self.snapshot()?
            .versions(participant)
            .ok_or_else(|| AccordError::UnknownParticipant(participant.to_string()))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Decide whether a participant version may be deployed
    ///
    /// Never fails: a broker that cannot read its stores answers
    /// `Unknown` with the failure message.
    pub fn can_i_deploy(&self, query: &DeploymentQuery) -> DeploymentResponse {
        match self.snapshot() {
            Ok(snapshot) => Evaluator::new(&snapshot, &self.config).can_i_deploy(query),
            Err(e) => DeploymentResponse::unknown(e.to_string()),
        }
    }

    /// Compatibility matrix between a consumer and a provider
    pub fn matrix(&self, consumer: &ParticipantName, provider: &ParticipantName) -> Result<Vec<MatrixRow>> {
        let snapshot = self.snapshot()?;
        Ok(Evaluator::new(&snapshot, &self.config).matrix(consumer, provider))
    }
}

impl Drop for Broker {
    fn drop(&mut self) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.sync() {
                warn!(error = %e, "failed to sync journal on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::{HttpMethod, ProviderState, RequestMatcher, ResponseMatcher};

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    fn ver(s: &str) -> VersionId {
        VersionId::new(s).unwrap()
    }

    fn interactions() -> Vec<Interaction> {
        vec![Interaction::new(
            "get order",
            RequestMatcher::new(HttpMethod::Get, "/orders/1"),
            ResponseMatcher::status(200),
        )]
    }

    #[test]
    fn test_ephemeral_publish_and_get() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        let reference = broker
            .publish(name("web"), ver("1"), name("orders"), interactions())
            .unwrap();
        let fetched = broker
            .get(&name("orders"), &name("web"), &ContractSelector::Version(ver("1")))
            .unwrap();
        assert_eq!(fetched, reference);
        assert_eq!(broker.document(&reference).unwrap().interactions, interactions());
    }

    #[test]
    fn test_get_selectors() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        let main = TagName::new("main").unwrap();
        broker.publish(name("web"), ver("1"), name("orders"), interactions()).unwrap();
        let doc = ContractDocument::new(name("web"), name("orders"), interactions());
        broker.publish_document(&ver("2"), doc, &[main.clone()]).unwrap();

        let latest = broker.get(&name("orders"), &name("web"), &ContractSelector::Latest).unwrap();
        assert_eq!(latest.consumer_version, ver("2"));
        let tagged = broker
            .get(&name("orders"), &name("web"), &ContractSelector::Tagged(main))
            .unwrap();
        assert_eq!(tagged.consumer_version, ver("2"));

        let missing = broker.get(
            &name("orders"),
            &name("web"),
            &ContractSelector::Tagged(TagName::new("prod").unwrap()),
        );
        assert!(matches!(missing, Err(AccordError::NotFound(_))));
    }

    #[test]
    fn test_shutdown_makes_operations_unavailable() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        broker.shutdown().unwrap();
        broker.shutdown().unwrap();
        assert!(!broker.is_open());

        let err = broker
            .publish(name("web"), ver("1"), name("orders"), interactions())
            .unwrap_err();
        assert!(err.is_store_failure());
        assert!(broker.participants().unwrap_err().is_store_failure());
    }

    #[test]
    fn test_verify_contract_reports_missing_and_mismatched_responses() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        let reference = broker
            .publish(name("web"), ver("1"), name("orders"), interactions())
            .unwrap();

        let none = broker
            .verify_contract(&reference, ver("9"), &BTreeMap::new())
            .unwrap();
        assert_eq!(none.outcome, Outcome::Failure);

        let mut observed = BTreeMap::new();
        observed.insert(
            "get order".to_string(),
            ObservedResponse {
                status: 404,
                headers: BTreeMap::new(),
                body: None,
            },
        );
        let report = broker.verify_contract(&reference, ver("9"), &observed).unwrap();
        assert_eq!(report.outcome, Outcome::Failure);
        assert_eq!(report.failures[0].mismatch, "status expected '200' but received '404'");

        observed.get_mut("get order").unwrap().status = 200;
        let report = broker.verify_contract(&reference, ver("9"), &observed).unwrap();
        assert_eq!(report.outcome, Outcome::Success);
        broker.record_report(report).unwrap();
        assert!(broker.latest_for(&reference, &ver("9")).unwrap().unwrap().is_success());
    }

    #[test]
    fn test_verify_contract_tells_provider_states_apart() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        let found = Interaction::new(
            "get order",
            RequestMatcher::new(HttpMethod::Get, "/orders/1"),
            ResponseMatcher::status(200),
        )
        .given(ProviderState::named("order exists"));
        let missing = Interaction::new(
            "get order",
            RequestMatcher::new(HttpMethod::Get, "/orders/1"),
            ResponseMatcher::status(404),
        )
        .given(ProviderState::named("no orders"));
        let reference = broker
            .publish(name("web"), ver("1"), name("orders"), vec![found, missing])
            .unwrap();

        let response = |status| ObservedResponse {
            status,
            headers: BTreeMap::new(),
            body: None,
        };
        let mut observed = BTreeMap::new();
        observed.insert("order exists::get order".to_string(), response(200));
        observed.insert("no orders::get order".to_string(), response(404));
        let report = broker.verify_contract(&reference, ver("9"), &observed).unwrap();
        assert_eq!(report.outcome, Outcome::Success, "{:?}", report.failures);

        observed.insert("no orders::get order".to_string(), response(200));
        let report = broker.verify_contract(&reference, ver("9"), &observed).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].interaction, "no orders::get order");
    }

    #[test]
    fn test_publish_document_retry_is_idempotent() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        let tags = [TagName::new("main").unwrap(), TagName::new("dev").unwrap()];
        let doc = ContractDocument::new(name("web"), name("orders"), interactions());
        let first = broker.publish_document(&ver("1"), doc.clone(), &tags).unwrap();
        let retry = broker.publish_document(&ver("1"), doc, &tags).unwrap();

        assert!(first.created);
        assert!(!retry.created);
        assert_eq!(retry.reference, first.reference);
        assert_eq!(
            broker.tags_for(&name("web"), &ver("1")).unwrap(),
            vec![TagName::new("dev").unwrap(), TagName::new("main").unwrap()]
        );
    }

    #[test]
    fn test_versions_of_unknown_participant() {
        let broker = Broker::ephemeral(BrokerConfig::default());
        assert!(matches!(
            broker.versions(&name("ghost")),
            Err(AccordError::UnknownParticipant(_))
        ));
    }
}
