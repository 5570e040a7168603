//! # Optimist Core
//!
//! Optimistic concurrency control for in-process mutable cells.
//!
//! This crate provides:
//! - [`Entity`]: a shared, versioned cell with lock-free-for-readers reads
//! - [`Stage`]: caller-owned staging pair giving optimistic commit and
//!   one-step rollback against an entity
//! - [`Transaction`]: all-or-nothing staged updates across a fixed, ordered
//!   list of entities, validated at commit time and compensated on failure
//!
//! ## Usage
//!
//! ```rust
//! use optimist_core::{Entity, Transaction};
//!
//! let name = Entity::new(String::from("Senthil"));
//! let balance = Entity::new(100_i64);
//!
//! let mut txn = Transaction::builder()
//!     .participant(&name)
//!     .participant(&balance)
//!     .build()
//!     .unwrap();
//!
//! txn.begin()
//!     .unwrap()
//!     .modify(0, |s: &String| format!("{s} Ganesh"))
//!     .unwrap()
//!     .modify(1, |n: &i64| n - 50)
//!     .unwrap();
//! txn.commit().unwrap();
//!
//! assert_eq!(name.get(), "Senthil Ganesh");
//! assert_eq!(balance.get(), 50);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod entity;
mod error;
mod transaction;
mod types;

pub use config::{Config, RollbackErrorPolicy};
pub use entity::{Entity, EntityId, Stage};
pub use error::{ConflictError, CoreError, CoreResult, StageOp};
pub use transaction::{Participant, Transaction, TransactionBuilder, TransactionState};
pub use types::{TransactionId, Version};
