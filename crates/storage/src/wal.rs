//! Write-ahead hook
//!
//! Stores call [`WriteAhead::append`] while holding the key's shard lock
//! and before the change becomes visible. If the append fails the store is
//! left untouched. Records carry everything needed to replay the write
//! deterministically, including the timestamps that were assigned.

use accord_core::{
    ContractDocument, ParticipantName, Result, TagName, Timestamp, VerificationReport, VersionId,
};
use serde::{Deserialize, Serialize};

/// One logged mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum LogRecord {
    /// A contract revision was published
    #[serde(rename_all = "camelCase")]
    Publish {
        /// Consumer version that produced the document
        consumer_version: VersionId,
        /// Full document
        document: ContractDocument,
        /// Broker time of the publish
        published_at: Timestamp,
    },
    /// A verification result was recorded
    Record {
        /// Report with `verified_at` filled in
        report: VerificationReport,
    },
    /// A tag was attached or moved
    Tag {
        /// Tagged participant
        participant: ParticipantName,
        /// Version now carrying the tag
        version: VersionId,
        /// Tag name
        tag: TagName,
    },
    /// A tag was removed
    Untag {
        /// Participant that carried the tag
        participant: ParticipantName,
        /// Tag name
        tag: TagName,
    },
}

/// Destination for logged mutations
pub trait WriteAhead: Send + Sync {
    /// Durably append one record
    fn append(&self, record: &LogRecord) -> Result<()>;
}

/// Write-ahead sink for in-memory brokers and replay
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWal;

impl WriteAhead for NoWal {
    fn append(&self, _record: &LogRecord) -> Result<()> {
        Ok(())
    }
}
