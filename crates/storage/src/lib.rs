//! Storage layer for Accord
//!
//! This crate implements the versioned in-memory stores behind the broker:
//! - CommitClock: global commit versions, published strictly in order
//! - VersionChain: append-only per-key entries stamped with their commit
//! - ContractStore: immutable contract revisions per (consumer, version, provider)
//! - VerificationRecorder: append-only verification results
//! - TagIndex: mutable tag → version pointers with history
//! - Registry: participants and versions
//! - StoreSnapshot: consistent read view across every store
//!
//! # Concurrency
//!
//! Every store is a set of DashMaps. Writes lock only the shard of the key
//! they touch, so unrelated keys never contend. The commit clock is the
//! only shared point, and it is held for a counter bump.
//!
//! # Durability
//!
//! Stores call a [`WriteAhead`] sink before a change becomes visible. The
//! engine supplies a journal; tests and ephemeral brokers use [`NoWal`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod clock;
pub mod contracts;
pub mod registry;
pub mod snapshot;
pub mod stores;
pub mod tags;
pub mod verifications;
pub mod wal;

pub use chain::{Committed, VersionChain};
pub use clock::{CommitClock, CommitTicket};
pub use contracts::{ContractRevision, ContractStore, PublishOutcome};
pub use registry::Registry;
pub use snapshot::StoreSnapshot;
pub use stores::{Stores, WriteContext};
pub use tags::{TagChange, TagIndex, TagKey};
pub use verifications::{PairKey, VerificationRecorder};
pub use wal::{LogRecord, NoWal, WriteAhead};
