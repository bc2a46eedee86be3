//! Accord - consumer-driven contract broker
//!
//! Consumers publish contracts describing the interactions they expect from
//! a provider. Providers record whether a given build satisfies each
//! contract revision. Tags mark which versions run in which environment or
//! sit on which branch, and `can-i-deploy` answers whether a version is
//! compatible with everything carrying the target tag.
//!
//! # Quick Start
//!
//! ```ignore
//! use accord::{Broker, BrokerConfig, DeploymentQuery, Outcome};
//!
//! let broker = Broker::ephemeral(BrokerConfig::default());
//! let contract = broker.publish(web, v1.clone(), orders, interactions)?;
//! broker.tag(&web, &v1, &prod)?;
//! broker.record(&contract, orders_v7.clone(), Outcome::Success, vec![])?;
//!
//! let answer = broker.can_i_deploy(&DeploymentQuery::new(orders, orders_v7, prod));
//! assert!(answer.is_deployable());
//! ```
//!
//! # Architecture
//!
//! All operations go through the [`Broker`]. Storage internals stay
//! behind it; only the read-side snapshot and the types its methods return
//! are exposed.

pub use accord_core::*;
pub use accord_engine::{
    Broker, BrokerConfig, ContractRevision, ContractSelector, MatrixRow, PublishOutcome,
    StoreSnapshot, TagChange, CONFIG_FILE_NAME, JOURNAL_FILE_NAME, LOCK_FILE_NAME,
};
