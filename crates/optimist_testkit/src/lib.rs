//! # Optimist Testkit
//!
//! Test utilities for Optimist.
//!
//! This crate provides:
//! - Entity and transaction fixtures for common scenarios
//! - Property-based test generators using proptest
//! - Multi-threaded stress harnesses with throughput reports
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use optimist_testkit::prelude::*;
//!
//! #[test]
//! fn transfer_commits() {
//!     init_tracing();
//!     let ledger = Ledger::new(&[100, 0]);
//!     ledger.transfer(0, 1, 40).unwrap();
//!     assert_eq!(ledger.balances(), vec![60, 40]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use stress::*;
