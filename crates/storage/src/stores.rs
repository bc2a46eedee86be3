//! The store aggregate
//!
//! All broker state lives in one [`Stores`] value: the commit clock plus
//! the four stores that stamp their entries with it. Writes go through a
//! [`WriteContext`], which bundles the clock, the registry every write
//! feeds, and the write-ahead sink for this broker.

use std::sync::Arc;

use crate::clock::CommitClock;
use crate::contracts::ContractStore;
use crate::registry::Registry;
use crate::snapshot::StoreSnapshot;
use crate::tags::TagIndex;
use crate::verifications::VerificationRecorder;
use crate::wal::WriteAhead;

/// Shared state for everything a write needs besides its own store
#[derive(Clone, Copy)]
pub struct WriteContext<'a> {
    /// Global commit clock
    pub clock: &'a CommitClock,
    /// Participant registry
    pub registry: &'a Registry,
    /// Write-ahead sink
    pub wal: &'a dyn WriteAhead,
}

/// Every store behind one commit clock
#[derive(Debug, Default)]
pub struct Stores {
    /// Global commit clock
    pub clock: CommitClock,
    /// Participant registry
    pub registry: Registry,
    /// Contract revisions
    pub contracts: ContractStore,
    /// Verification results
    pub verifications: VerificationRecorder,
    /// Tag pointers
    pub tags: TagIndex,
}

impl Stores {
    /// Create empty stores
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for writes logged to `wal`
    pub fn write_context<'a>(&'a self, wal: &'a dyn WriteAhead) -> WriteContext<'a> {
        WriteContext {
            clock: &self.clock,
            registry: &self.registry,
            wal,
        }
    }

    /// Consistent read view at the current visible version
    ///
    /// Later writes never show through the snapshot.
    pub fn snapshot(self: &Arc<Self>) -> StoreSnapshot {
        StoreSnapshot::new(Arc::clone(self), self.clock.visible())
    }
}
