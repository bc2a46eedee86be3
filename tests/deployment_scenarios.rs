//! End-to-end deployment scenarios through the public `accord` API.

use accord::{
    AccordError, Broker, BrokerConfig, DeploymentQuery, HttpMethod, Interaction, Outcome,
    ParticipantName, Reason, RequestMatcher, ResponseMatcher, TagName, Timestamp, Verdict,
    VerificationReport, VersionId,
};

fn name(s: &str) -> ParticipantName {
    ParticipantName::new(s).unwrap()
}

fn ver(s: &str) -> VersionId {
    VersionId::new(s).unwrap()
}

fn tag(s: &str) -> TagName {
    TagName::new(s).unwrap()
}

fn get_order(status: u16) -> Vec<Interaction> {
    vec![Interaction::new(
        "get order 1",
        RequestMatcher::new(HttpMethod::Get, "/orders/1"),
        ResponseMatcher::status(status),
    )]
}

fn broker() -> Broker {
    Broker::ephemeral(BrokerConfig::default())
}

#[test]
fn test_identical_republish_is_idempotent() {
    let broker = broker();
    let first = broker.publish(name("c"), ver("1"), name("p"), get_order(200)).unwrap();
    let second = broker.publish(name("c"), ver("1"), name("p"), get_order(200)).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.revision, 1);
    assert_eq!(broker.revisions(&name("c"), &ver("1"), &name("p")).unwrap().len(), 1);
}

#[test]
fn test_empty_contract_is_rejected() {
    let broker = broker();
    let err = broker.publish(name("c"), ver("1"), name("p"), vec![]).unwrap_err();
    assert!(matches!(err, AccordError::InvalidContract(_)));
    assert!(broker.participants().unwrap().is_empty());
}

#[test]
fn test_latest_verification_wins() {
    let broker = broker();
    let contract = broker.publish(name("c"), ver("1"), name("p"), get_order(200)).unwrap();
    let report = |outcome, at| VerificationReport {
        contract: contract.clone(),
        provider_version: ver("1"),
        outcome,
        failures: vec![],
        verified_at: Some(Timestamp::from_secs(at)),
    };

    broker.record_report(report(Outcome::Success, 1_000)).unwrap();
    broker.record_report(report(Outcome::Failure, 2_000)).unwrap();
    let latest = broker.latest_for(&contract, &ver("1")).unwrap().unwrap();
    assert_eq!(latest.outcome, Outcome::Failure);

    // An older result arriving late does not displace the newer one.
    broker.record_report(report(Outcome::Success, 1_500)).unwrap();
    let latest = broker.latest_for(&contract, &ver("1")).unwrap().unwrap();
    assert_eq!(latest.outcome, Outcome::Failure);
    assert_eq!(broker.history(&contract, &ver("1")).unwrap().len(), 3);
}

#[test]
fn test_losing_one_verification_flips_the_answer() {
    let broker = broker();
    let web = broker.publish(name("web"), ver("1"), name("orders"), get_order(200)).unwrap();
    let mobile = broker.publish(name("mobile"), ver("4"), name("orders"), get_order(200)).unwrap();
    broker.tag(&name("web"), &ver("1"), &tag("prod")).unwrap();
    broker.tag(&name("mobile"), &ver("4"), &tag("prod")).unwrap();
    broker.record(&web, ver("9"), Outcome::Success, vec![]).unwrap();
    broker.record(&mobile, ver("9"), Outcome::Success, vec![]).unwrap();

    let query = DeploymentQuery::new(name("orders"), ver("9"), tag("prod"));
    let response = broker.can_i_deploy(&query);
    assert_eq!(response.verdict, Verdict::Yes);
    assert_eq!(response.satisfied.len(), 2);

    broker.record(&mobile, ver("9"), Outcome::Failure, vec![]).unwrap();
    let response = broker.can_i_deploy(&query);
    assert_eq!(response.verdict, Verdict::No);
    assert_eq!(response.unsatisfied.len(), 1);
    assert_eq!(response.unsatisfied[0].contract, mobile);
    assert_eq!(response.unsatisfied[0].reason, Reason::VerificationFailed);
}

#[test]
fn test_retagging_changes_which_contracts_apply() {
    let broker = broker();
    let v1 = broker.publish(name("web"), ver("1"), name("orders"), get_order(200)).unwrap();
    let v2 = broker.publish(name("web"), ver("2"), name("orders"), get_order(201)).unwrap();
    broker.record(&v1, ver("9"), Outcome::Success, vec![]).unwrap();
    broker.tag(&name("web"), &ver("1"), &tag("main")).unwrap();

    let query = DeploymentQuery::new(name("orders"), ver("9"), tag("main"));
    assert_eq!(broker.can_i_deploy(&query).verdict, Verdict::Yes);

    broker.tag(&name("web"), &ver("2"), &tag("main")).unwrap();
    let response = broker.can_i_deploy(&query);
    assert_eq!(response.verdict, Verdict::No);
    assert_eq!(response.unsatisfied[0].contract, v2);
    assert_eq!(response.unsatisfied[0].reason, Reason::NoVerification);
}

#[test]
fn test_republished_contract_needs_new_verification() {
    let broker = broker();
    let query = DeploymentQuery::new(name("P"), ver("v1"), tag("main"));

    let first = broker.publish(name("C"), ver("v1"), name("P"), get_order(200)).unwrap();
    broker.tag(&name("C"), &ver("v1"), &tag("main")).unwrap();
    let response = broker.can_i_deploy(&query);
    assert_eq!(response.verdict, Verdict::No);
    assert_eq!(response.unsatisfied[0].reason.to_string(), "no verification found");

    broker.record(&first, ver("v1"), Outcome::Success, vec![]).unwrap();
    assert_eq!(broker.can_i_deploy(&query).verdict, Verdict::Yes);

    let second = broker.publish(name("C"), ver("v1"), name("P"), get_order(204)).unwrap();
    assert_eq!(second.revision, 2);
    let response = broker.can_i_deploy(&query);
    assert_eq!(response.verdict, Verdict::No);
    assert_eq!(response.unsatisfied[0].contract, second);
    assert_eq!(
        response.unsatisfied[0].reason.to_string(),
        "verification is for a superseded contract revision"
    );

    broker.record(&second, ver("v1"), Outcome::Success, vec![]).unwrap();
    assert_eq!(broker.can_i_deploy(&query).verdict, Verdict::Yes);
}

#[test]
fn test_recording_unknown_revision_fails() {
    let broker = broker();
    let mut contract = broker.publish(name("c"), ver("1"), name("p"), get_order(200)).unwrap();
    contract.revision = 7;
    let err = broker.record(&contract, ver("1"), Outcome::Success, vec![]).unwrap_err();
    assert!(matches!(err, AccordError::UnknownContract(_)));
}

#[test]
fn test_query_and_response_json_shapes() {
    let broker = broker();
    broker.publish(name("C"), ver("v1"), name("P"), get_order(200)).unwrap();
    broker.tag(&name("C"), &ver("v1"), &tag("main")).unwrap();

    let query: DeploymentQuery =
        serde_json::from_str(r#"{"participant":"P","version":"v1","targetTag":"main"}"#).unwrap();
    let response = serde_json::to_value(broker.can_i_deploy(&query)).unwrap();
    assert_eq!(response["verdict"], "no");
    assert_eq!(response["unsatisfied"][0]["providerVersion"], "v1");
    assert_eq!(response["unsatisfied"][0]["tag"], "main");
    assert_eq!(response["unsatisfied"][0]["reason"], "noVerification");
}
