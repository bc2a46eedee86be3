//! Broker engine for Accord
//!
//! This crate orchestrates the lower layers:
//! - Broker: the façade with ephemeral/open/shutdown and every operation
//! - BrokerConfig: `accord.toml` in the data directory
//! - Journal: JSON-lines write-ahead log and its replay
//! - Evaluator: `can-i-deploy` and the compatibility matrix
//!
//! The engine is the only component that knows about:
//! - The data directory layout
//! - Durability (journal + replay)
//! - Cross-store queries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod broker;
pub mod evaluator;
pub mod journal;
pub mod replay;

pub use broker::config::{BrokerConfig, CONFIG_FILE_NAME};
pub use broker::{Broker, ContractSelector, LOCK_FILE_NAME};
pub use evaluator::{Evaluator, MatrixRow};
pub use journal::{Journal, JOURNAL_FILE_NAME};

pub use accord_storage::{ContractRevision, PublishOutcome, StoreSnapshot, TagChange};
