//! Journal replay
//!
//! Rebuilds in-memory stores from journal records. Records are applied
//! in file order through the same store operations that produced them,
//! with the timestamps they were logged with, so the rebuilt state answers
//! every query the way the original broker did. Replay never writes to the
//! journal.

use accord_core::{AccordError, Result};
use accord_storage::{LogRecord, NoWal, Stores};
use tracing::info;

/// Apply `records` to `stores`, oldest-first
///
/// A record the stores reject means the journal does not describe a state
/// this broker could have produced, and fails with `Corruption`.
pub fn replay(stores: &Stores, records: Vec<LogRecord>) -> Result<usize> {
    let ctx = stores.write_context(&NoWal);
    let total = records.len();

    for (index, record) in records.into_iter().enumerate() {
        let applied = match record {
            LogRecord::Publish {
                consumer_version,
                document,
                published_at,
            } => stores
                .contracts
                .publish(&consumer_version, document, published_at, &ctx)
                .map(|_| ()),
            LogRecord::Record { report } => stores
                .verifications
                .record(report, &stores.contracts, &ctx)
                .map(|_| ()),
            LogRecord::Tag {
                participant,
                version,
                tag,
            } => stores.tags.tag(&participant, &version, &tag, &ctx).map(|_| ()),
            LogRecord::Untag { participant, tag } => {
                stores.tags.untag(&participant, &tag, &ctx).map(|_| ())
            }
        };
        applied.map_err(|e| {
            AccordError::Corruption(format!("journal record {} cannot be replayed: {}", index + 1, e))
        })?;
    }

    if total > 0 {
        info!(records = total, version = stores.clock.visible(), "replayed journal");
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::{
        ContractDocument, HttpMethod, Interaction, Outcome, ParticipantName, RequestMatcher,
        ResponseMatcher, TagName, Timestamp, VerificationReport, VersionId,
    };

    fn document() -> ContractDocument {
        ContractDocument::new(
            ParticipantName::new("web").unwrap(),
            ParticipantName::new("orders").unwrap(),
            vec![Interaction::new(
                "list orders",
                RequestMatcher::new(HttpMethod::Get, "/orders"),
                ResponseMatcher::status(200),
            )],
        )
    }

    #[test]
    fn test_replay_rebuilds_state() {
        let source = Stores::new();
        let ctx = source.write_context(&NoWal);
        let published_at = Timestamp::from_secs(1_000);
        let outcome = source
            .contracts
            .publish(&VersionId::new("1").unwrap(), document(), published_at, &ctx)
            .unwrap();
        let report = VerificationReport {
            contract: outcome.reference.clone(),
            provider_version: VersionId::new("7").unwrap(),
            outcome: Outcome::Success,
            failures: vec![],
            verified_at: Some(Timestamp::from_secs(2_000)),
        };

        let records = vec![
            LogRecord::Publish {
                consumer_version: VersionId::new("1").unwrap(),
                document: document(),
                published_at,
            },
            LogRecord::Record { report },
            LogRecord::Tag {
                participant: ParticipantName::new("web").unwrap(),
                version: VersionId::new("1").unwrap(),
                tag: TagName::new("main").unwrap(),
            },
        ];
        let rebuilt = Stores::new();
        assert_eq!(replay(&rebuilt, records).unwrap(), 3);

        let current = rebuilt.contracts.current(&outcome.reference.key(), u64::MAX).unwrap();
        assert_eq!(current.reference, outcome.reference);
        assert_eq!(current.published_at, published_at);
        let latest = rebuilt
            .verifications
            .latest_for(&outcome.reference, &VersionId::new("7").unwrap(), u64::MAX)
            .unwrap();
        assert_eq!(latest.verified_at, Timestamp::from_secs(2_000));
        assert_eq!(rebuilt.clock.visible(), 3);
    }

    #[test]
    fn test_unreplayable_record_is_corruption() {
        let records = vec![LogRecord::Untag {
            participant: ParticipantName::new("ghost").unwrap(),
            tag: TagName::new("main").unwrap(),
        }];
        let err = replay(&Stores::new(), records).unwrap_err();
        assert!(matches!(err, AccordError::Corruption(_)));
    }
}
