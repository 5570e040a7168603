//! Transaction configuration.

use crate::error::ConflictError;

/// How [`Transaction::rollback`](crate::Transaction::rollback) reports
/// per-participant failures.
///
/// Rollback never stops at the first failure; this only decides what the
/// returned error carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollbackErrorPolicy {
    /// Report every captured failure, in participant order.
    #[default]
    Aggregate,
    /// Report only the last captured failure.
    LastWins,
}

impl RollbackErrorPolicy {
    /// Reduces captured failures according to the policy.
    #[must_use]
    pub fn apply(self, mut failures: Vec<ConflictError>) -> Vec<ConflictError> {
        match self {
            Self::Aggregate => failures,
            Self::LastWins => failures.pop().into_iter().collect(),
        }
    }
}

/// Configuration for a transaction.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Failure reporting for rollback.
    pub rollback_errors: RollbackErrorPolicy,

    /// Name attached to the transaction's log events.
    pub label: Option<String>,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rollback failure reporting policy.
    #[must_use]
    pub const fn rollback_errors(mut self, policy: RollbackErrorPolicy) -> Self {
        self.rollback_errors = policy;
        self
    }

    /// Sets the label used in log events.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
