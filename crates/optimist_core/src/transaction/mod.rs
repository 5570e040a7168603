//! Multi-entity optimistic transactions.
//!
//! A transaction groups a fixed, ordered list of entities and gives
//! all-or-nothing updates over them:
//! - **Snapshot**: `begin` records every participant's live value
//! - **Staging**: `modify` computes proposals privately, nothing is published
//! - **Validation**: `commit` publishes in index order, stopping at the first
//!   participant that moved since it was snapshotted
//! - **Compensation**: a failed commit rolls back the prefix it published
//!
//! The guarantee comes from publish-then-compensate, not from a single
//! atomic multi-cell write.

mod builder;
mod participant;
mod state;

pub use builder::TransactionBuilder;
pub use participant::Participant;
pub use state::{Transaction, TransactionState};
