//! Transaction builder.

use super::{Participant, Transaction};
use crate::config::Config;
use crate::entity::Entity;
use crate::error::CoreResult;

/// Collects participants, in commit order, for a [`Transaction`].
///
/// # Example
///
/// ```rust
/// use optimist_core::{Config, Entity, Transaction};
///
/// let a = Entity::new(1_u32);
/// let b = Entity::new(String::new());
///
/// let txn = Transaction::builder()
///     .participant(&a)
///     .participant(&b)
///     .config(Config::new().label("setup"))
///     .build()
///     .unwrap();
/// assert_eq!(txn.len(), 2);
/// ```
#[derive(Default)]
pub struct TransactionBuilder {
    participants: Vec<Box<dyn Participant>>,
    config: Config,
}

impl TransactionBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entity` as the next participant.
    #[must_use]
    pub fn participant<T>(mut self, entity: &Entity<T>) -> Self
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        self.participants.push(entity.participant());
        self
    }

    /// Appends a custom participant.
    ///
    /// It is validated, committed and rolled back like any other slot, but
    /// cannot be staged through [`Transaction::modify`].
    #[must_use]
    pub fn boxed(mut self, participant: Box<dyn Participant>) -> Self {
        self.participants.push(participant);
        self
    }

    /// Sets the transaction configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the transaction. Fails if no participant was added.
    pub fn build(self) -> CoreResult<Transaction> {
        Transaction::with_config(self.participants, self.config)
    }
}

impl Transaction {
    /// Starts building a transaction.
    #[must_use]
    pub fn builder() -> TransactionBuilder {
        TransactionBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollbackErrorPolicy;
    use crate::error::CoreError;

    #[test]
    fn builds_in_insertion_order() {
        let a = Entity::new(1_i32);
        let b = Entity::new("b".to_string());
        let mut txn = Transaction::builder()
            .participant(&a)
            .participant(&b)
            .build()
            .unwrap();

        txn.begin().unwrap();
        assert_eq!(txn.snapshot::<i32>(0).unwrap(), 1);
        assert_eq!(txn.snapshot::<String>(1).unwrap(), "b");
    }

    #[test]
    fn empty_builder_fails() {
        let err = Transaction::builder().build().unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn config_is_applied() {
        let a = Entity::new(0_u8);
        let txn = Transaction::builder()
            .participant(&a)
            .config(
                Config::new()
                    .rollback_errors(RollbackErrorPolicy::LastWins)
                    .label("demo"),
            )
            .build()
            .unwrap();

        assert_eq!(txn.config().rollback_errors, RollbackErrorPolicy::LastWins);
        assert_eq!(txn.config().label.as_deref(), Some("demo"));
    }

    #[test]
    fn boxed_participants_mix_with_entities() {
        let a = Entity::new(0_u8);
        let b = Entity::new(0_u16);
        let txn = Transaction::builder()
            .participant(&a)
            .boxed(b.participant())
            .build()
            .unwrap();
        assert_eq!(txn.len(), 2);
    }
}
