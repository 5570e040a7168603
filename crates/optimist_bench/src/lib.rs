//! Shared helpers for Optimist benchmarks.

#![warn(missing_docs)]

pub mod utils;
