//! Concurrent broker tests
//!
//! Queries run against one snapshot, so they never observe a tag move
//! half-applied, and writes to unrelated participants proceed in parallel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use accord_core::{
    DeploymentQuery, HttpMethod, Interaction, Outcome, ParticipantName, RequestMatcher,
    ResponseMatcher, TagName, Verdict, VersionId,
};
use accord_engine::{Broker, BrokerConfig};

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

#[test]
fn test_queries_see_whole_tag_moves() {
    let broker = Arc::new(Broker::ephemeral(BrokerConfig::default()));
    let good = broker
        .publish(name("web"), ver("1"), name("orders"), interactions(200))
        .unwrap();
    let bad = broker
        .publish(name("web"), ver("2"), name("orders"), interactions(201))
        .unwrap();
    broker.record(&good, ver("1"), Outcome::Success, vec![]).unwrap();
    broker.record(&bad, ver("1"), Outcome::Failure, vec![]).unwrap();
    broker.tag(&name("web"), &ver("1"), &tag("main")).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let broker = Arc::clone(&broker);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..500 {
                let version = if i % 2 == 0 { "2" } else { "1" };
                broker.tag(&name("web"), &ver(version), &tag("main")).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let broker = Arc::clone(&broker);
            let done = Arc::clone(&done);
            let good = good.clone();
            let bad = bad.clone();
            thread::spawn(move || {
                let query = DeploymentQuery::new(name("orders"), ver("1"), tag("main"));
                while !done.load(Ordering::SeqCst) {
                    let response = broker.can_i_deploy(&query);
                    match response.verdict {
                        Verdict::Yes => {
                            assert_eq!(response.satisfied.len(), 1);
                            assert_eq!(response.satisfied[0].contract, good);
                            assert!(response.unsatisfied.is_empty());
                        }
                        Verdict::No => {
                            assert_eq!(response.unsatisfied.len(), 1);
                            assert_eq!(response.unsatisfied[0].contract, bad);
                            assert!(response.satisfied.is_empty());
                        }
                        Verdict::Unknown => panic!("broker is open"),
                    }
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_parallel_participants_each_get_their_answer() {
    let broker = Arc::new(Broker::ephemeral(BrokerConfig::default()));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let broker = Arc::clone(&broker);
            thread::spawn(move || {
                let consumer = name(&format!("consumer-{t}"));
                let provider = name(&format!("provider-{t}"));
                let contract = broker
                    .publish(consumer.clone(), ver("1"), provider.clone(), interactions(200))
                    .unwrap();
                broker.tag(&consumer, &ver("1"), &tag("prod")).unwrap();
                if t % 2 == 0 {
                    broker.record(&contract, ver("1"), Outcome::Success, vec![]).unwrap();
                }
                broker.can_i_deploy(&DeploymentQuery::new(provider, ver("1"), tag("prod"))).verdict
            })
        })
        .collect();

    for (t, handle) in handles.into_iter().enumerate() {
        let expected = if t % 2 == 0 { Verdict::Yes } else { Verdict::No };
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert_eq!(broker.participants().unwrap().len(), 16);
}
