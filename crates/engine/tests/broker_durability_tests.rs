//! Durable broker tests
//!
//! These tests verify that a broker opened on a data directory:
//! 1. Writes a default `accord.toml` and honors an edited one
//! 2. Answers identically after being reopened
//! 3. Survives a torn journal tail
//! 4. Refuses a second opener while the directory is locked

use std::io::Write;

use accord_core::{
    AccordError, DeploymentQuery, EmptyPolicy, HttpMethod, Interaction, Outcome, ParticipantName,
    RequestMatcher, ResponseMatcher, TagName, Verdict, VersionId,
};
use accord_engine::{Broker, BrokerConfig, CONFIG_FILE_NAME, JOURNAL_FILE_NAME};
use tempfile::tempdir;

fn name(s: &str) -> ParticipantName {
    ParticipantName::new(s).unwrap()
}

fn ver(s: &str) -> VersionId {
    VersionId::new(s).unwrap()
}

fn tag(s: &str) -> TagName {
    TagName::new(s).unwrap()
}

fn interactions(status: u16) -> Vec<Interaction> {
    vec![Interaction::new(
        "get order",
        RequestMatcher::new(HttpMethod::Get, "/orders/1"),
        ResponseMatcher::status(status),
    )]
}

fn main_query() -> DeploymentQuery {
    DeploymentQuery::new(name("orders"), ver("1"), tag("main"))
}

#[test]
fn test_open_writes_default_config() {
    let dir = tempdir().unwrap();
    let broker = Broker::open(dir.path()).unwrap();
    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    assert!(dir.path().join(JOURNAL_FILE_NAME).exists());
    assert_eq!(broker.config(), &BrokerConfig::default());
    assert_eq!(broker.data_dir(), Some(dir.path()));
}

#[test]
fn test_open_honors_edited_config() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "empty_policy = \"deny\"\n").unwrap();
    let broker = Broker::open(dir.path()).unwrap();
    assert_eq!(broker.config().empty_policy, EmptyPolicy::Deny);
    assert_eq!(broker.can_i_deploy(&main_query()).verdict, Verdict::No);
}

#[test]
fn test_invalid_config_fails_open() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "empty_policy = 3\n").unwrap();
    assert!(matches!(Broker::open(dir.path()), Err(AccordError::Config(_))));
}

#[test]
fn test_reopened_broker_answers_identically() {
    let dir = tempdir().unwrap();
    let (contract, before, history_len) = {
        let broker = Broker::open(dir.path()).unwrap();
        broker
            .publish(name("web"), ver("1"), name("orders"), interactions(200))
            .unwrap();
        let contract = broker
            .publish(name("web"), ver("1"), name("orders"), interactions(201))
            .unwrap();
        broker.tag(&name("web"), &ver("1"), &tag("main")).unwrap();
        broker.tag(&name("web"), &ver("1"), &tag("prod")).unwrap();
        broker.untag(&name("web"), &tag("prod")).unwrap();
        broker.record(&contract, ver("1"), Outcome::Failure, vec![]).unwrap();
        broker.record(&contract, ver("1"), Outcome::Success, vec![]).unwrap();
        let before = broker.can_i_deploy(&main_query());
        let history_len = broker.history(&contract, &ver("1")).unwrap().len();
        broker.shutdown().unwrap();
        (contract, before, history_len)
    };

    let broker = Broker::open(dir.path()).unwrap();
    assert_eq!(broker.can_i_deploy(&main_query()), before);
    assert_eq!(before.verdict, Verdict::Yes);
    assert_eq!(broker.history(&contract, &ver("1")).unwrap().len(), history_len);
    assert_eq!(
        broker.revisions(&name("web"), &ver("1"), &name("orders")).unwrap().len(),
        2
    );
    assert!(broker.versions_for_tag(&name("web"), &tag("prod")).unwrap().is_empty());
    assert_eq!(broker.tags_for(&name("web"), &ver("1")).unwrap(), vec![tag("main")]);
}

#[test]
fn test_torn_journal_tail_is_ignored() {
    let dir = tempdir().unwrap();
    let contract = {
        let broker = Broker::open(dir.path()).unwrap();
        let contract = broker
            .publish(name("web"), ver("1"), name("orders"), interactions(200))
            .unwrap();
        broker.tag(&name("web"), &ver("1"), &tag("main")).unwrap();
        contract
    };

    let mut journal = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join(JOURNAL_FILE_NAME))
        .unwrap();
    journal.write_all(b"{\"op\":\"record\",\"report\":{\"contr").unwrap();
    drop(journal);

    let broker = Broker::open(dir.path()).unwrap();
    assert_eq!(broker.document(&contract).unwrap().interactions, interactions(200));
    let response = broker.can_i_deploy(&main_query());
    assert_eq!(response.verdict, Verdict::No);

    broker.record(&contract, ver("1"), Outcome::Success, vec![]).unwrap();
    drop(broker);
    let broker = Broker::open(dir.path()).unwrap();
    assert_eq!(broker.can_i_deploy(&main_query()).verdict, Verdict::Yes);
}

#[test]
fn test_second_opener_is_refused() {
    let dir = tempdir().unwrap();
    let first = Broker::open(dir.path()).unwrap();
    let err = Broker::open(dir.path()).unwrap_err();
    assert!(err.is_store_failure());

    drop(first);
    assert!(Broker::open(dir.path()).is_ok());
}

#[test]
fn test_writes_after_shutdown_are_not_journaled() {
    let dir = tempdir().unwrap();
    {
        let broker = Broker::open(dir.path()).unwrap();
        broker.tag(&name("web"), &ver("1"), &tag("main")).unwrap();
        broker.shutdown().unwrap();
        assert!(broker.tag(&name("web"), &ver("2"), &tag("main")).is_err());
    }
    let broker = Broker::open(dir.path()).unwrap();
    let carried = broker.versions_for_tag(&name("web"), &tag("main")).unwrap();
    assert_eq!(carried.into_iter().collect::<Vec<_>>(), vec![ver("1")]);
}
