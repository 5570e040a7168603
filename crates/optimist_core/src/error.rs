//! Error types for Optimist core.

use crate::entity::EntityId;
use crate::types::{TransactionId, Version};
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Which publish step of a stage hit a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageOp {
    /// Publishing the pending value.
    Commit,
    /// Publishing the prior value back.
    Rollback,
}

impl fmt::Display for StageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => f.write_str("commit"),
            Self::Rollback => f.write_str("rollback"),
        }
    }
}

/// A stage's baseline no longer matches the entity's live value.
///
/// Someone published to the entity after this stage last touched it. The
/// caller may re-stage and try again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dirty read on entity {entity} during {op} (live version {observed})")]
pub struct ConflictError {
    /// The entity whose value moved.
    pub entity: EntityId,
    /// The step that detected the conflict.
    pub op: StageOp,
    /// Version of the live value observed at the failed check.
    pub observed: Version,
}

/// Errors that can occur in Optimist core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Optimistic check failed on a single entity.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Participant index outside the transaction.
    #[error("allowed range for index is [0..{}], got {index}", .len.saturating_sub(1))]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of participants.
        len: usize,
    },

    /// Participant payload type differs from the requested one.
    #[error("participant {index} does not hold values of type {expected}")]
    TypeMismatch {
        /// The requested index.
        index: usize,
        /// Name of the type the caller asked for.
        expected: &'static str,
    },

    /// Transaction commit failed validation and was compensated.
    #[error("transaction {txn} aborted at participant {failed_at}: {reason}")]
    TransactionAborted {
        /// The aborted transaction.
        txn: TransactionId,
        /// Index of the first participant that failed validation.
        failed_at: usize,
        /// Human-readable reason.
        reason: String,
        /// Entity-level conflict that caused the abort, if any.
        #[source]
        conflict: Option<ConflictError>,
        /// Published participants that could not be reverted.
        compensation_failures: Vec<ConflictError>,
    },

    /// One or more participants could not be rolled back.
    #[error("transaction {txn} rollback failed for {} participant(s)", .failures.len())]
    RollbackFailed {
        /// The transaction being rolled back.
        txn: TransactionId,
        /// Captured entity-level failures, in participant order.
        failures: Vec<ConflictError>,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates an index out of range error.
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Creates a type mismatch error for `T`.
    pub fn type_mismatch<T>(index: usize) -> Self {
        Self::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true for a single-entity conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true for an aborted transaction commit.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::TransactionAborted { .. })
    }

    /// Returns true for any transaction-level failure (abort or rollback).
    #[must_use]
    pub fn is_transaction_error(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted { .. } | Self::RollbackFailed { .. }
        )
    }

    /// Returns true if the caller may retry with fresh state.
    ///
    /// Conflicts can be re-staged on the same stage. An aborted transaction
    /// is retried by building a new one.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::TransactionAborted { .. })
    }

    /// Returns the entity-level conflict behind this error, if any.
    #[must_use]
    pub fn conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict(c) => Some(c),
            Self::TransactionAborted { conflict, .. } => conflict.as_ref(),
            _ => None,
        }
    }
}
