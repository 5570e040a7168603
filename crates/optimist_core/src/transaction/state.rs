//! Transaction state.

use super::participant::{Participant, Slot};
use crate::config::Config;
use crate::error::{ConflictError, CoreError, CoreResult};
use crate::types::TransactionId;
use std::fmt;

/// Message of an abort that no entity-level conflict explains.
const RETRY_REASON: &str = "please retry the transaction";

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created, `begin` not yet called.
    Unopened,
    /// Snapshot taken; participants can be staged.
    Open,
    /// Every participant was published.
    Committed,
    /// A committed transaction was rolled back.
    RolledBack,
    /// Commit failed validation and was compensated. Terminal.
    Aborted,
}

/// All-or-nothing staged updates over a fixed, ordered list of entities.
///
/// A transaction keeps one stage and one snapshot per participant. Staged
/// values stay private until [`commit`](Self::commit), which validates each
/// participant against its snapshot in index order and publishes it. If
/// any participant fails, the participants already published are rolled
/// back and the commit returns [`CoreError::TransactionAborted`].
///
/// Plain reads of a participant entity always see its live value, never the
/// transaction's proposal. An aborted transaction cannot be reused; build a
/// new one to retry.
pub struct Transaction {
    /// Transaction ID.
    id: TransactionId,
    /// Configuration.
    config: Config,
    /// Current state.
    state: TransactionState,
    /// Participants in commit order.
    participants: Vec<Box<dyn Participant>>,
}

impl Transaction {
    /// Creates a transaction over `participants` with default configuration.
    ///
    /// Fails if `participants` is empty.
    pub fn new(participants: Vec<Box<dyn Participant>>) -> CoreResult<Self> {
        Self::with_config(participants, Config::default())
    }

    /// Creates a transaction over `participants` with `config`.
    ///
    /// Fails if `participants` is empty.
    pub fn with_config(
        participants: Vec<Box<dyn Participant>>,
        config: Config,
    ) -> CoreResult<Self> {
        if participants.is_empty() {
            return Err(CoreError::invalid_operation(
                "transaction requires at least one participant",
            ));
        }
        Ok(Self {
            id: TransactionId::next(),
            config,
            state: TransactionState::Unopened,
            participants,
        })
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Always false: transactions have at least one participant.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Returns the snapshot value recorded for participant `index`.
    ///
    /// Fails with `TypeMismatch` if the slot is not an `Entity<T>`
    /// participant, including any custom [`Participant`].
    pub fn snapshot<T>(&self, index: usize) -> CoreResult<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let participant = self
            .participants
            .get(index)
            .ok_or_else(|| CoreError::index_out_of_range(index, self.len()))?;
        participant
            .as_any()
            .downcast_ref::<Slot<T>>()
            .map(|slot| slot.snapshot().clone())
            .ok_or_else(|| CoreError::type_mismatch::<T>(index))
    }

    /// Snapshots every participant's live value.
    ///
    /// Also drops anything staged so far, so calling it again while open
    /// starts the staging over.
    pub fn begin(&mut self) -> CoreResult<&mut Self> {
        match self.state {
            TransactionState::Unopened | TransactionState::Open => {}
            _ => return Err(self.not_allowed("begin")),
        }

        for participant in &mut self.participants {
            participant.capture();
        }
        self.state = TransactionState::Open;

        tracing::debug!(
            txn = %self.id,
            label = self.label(),
            participants = self.participants.len(),
            "transaction begun"
        );
        Ok(self)
    }

    /// Stages `f` against participant `index`.
    ///
    /// The participant's snapshot is refreshed to its live value, which is
    /// also the value `f` receives. Nothing is published. Only slots built by
    /// [`Entity::participant`](crate::Entity::participant) can be staged.
    pub fn modify<T, F>(&mut self, index: usize, f: F) -> CoreResult<&mut Self>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        let len = self.participants.len();
        if index >= len {
            return Err(CoreError::index_out_of_range(index, len));
        }
        if self.state != TransactionState::Open {
            return Err(self.not_allowed("modify"));
        }

        self.participants[index]
            .as_any_mut()
            .downcast_mut::<Slot<T>>()
            .ok_or_else(|| CoreError::type_mismatch::<T>(index))?
            .stage_with(f);

        tracing::trace!(txn = %self.id, index, "participant staged");
        Ok(self)
    }

    /// Validates and publishes every participant, in index order.
    ///
    /// Scanning stops at the first participant whose live value moved away
    /// from its snapshot, or whose publish loses a race. Participants before
    /// it are rolled back; participants after it are never touched. The
    /// transaction is then [`Aborted`](TransactionState::Aborted).
    pub fn commit(&mut self) -> CoreResult<&mut Self> {
        if self.state != TransactionState::Open {
            return Err(self.not_allowed("commit"));
        }

        let mut failure: Option<(usize, Option<ConflictError>)> = None;
        for (index, participant) in self.participants.iter_mut().enumerate() {
            if !participant.is_current() {
                failure = Some((index, None));
                break;
            }
            if let Err(conflict) = participant.commit() {
                failure = Some((index, Some(conflict)));
                break;
            }
        }

        let Some((failed_at, conflict)) = failure else {
            self.state = TransactionState::Committed;
            tracing::debug!(txn = %self.id, label = self.label(), "transaction committed");
            return Ok(self);
        };

        let mut compensation_failures = Vec::new();
        for participant in &mut self.participants[..failed_at] {
            if let Err(e) = participant.rollback() {
                tracing::warn!(
                    txn = %self.id,
                    entity = %e.entity,
                    "published participant could not be reverted"
                );
                compensation_failures.push(e);
            }
        }
        self.state = TransactionState::Aborted;

        let reason = match &conflict {
            Some(c) => c.to_string(),
            None => RETRY_REASON.to_string(),
        };
        tracing::warn!(
            txn = %self.id,
            label = self.label(),
            failed_at,
            reverted = failed_at - compensation_failures.len(),
            %reason,
            "transaction aborted"
        );
        Err(CoreError::TransactionAborted {
            txn: self.id,
            failed_at,
            reason,
            conflict,
            compensation_failures,
        })
    }

    /// Reverts every participant that still holds this transaction's value.
    ///
    /// Participants changed by someone else after the commit are left alone.
    /// A failure on one participant does not stop the others; failures are
    /// reported after the full scan, shaped by
    /// [`Config::rollback_errors`](crate::Config::rollback_errors).
    pub fn rollback(&mut self) -> CoreResult<&mut Self> {
        if self.state != TransactionState::Committed {
            return Err(self.not_allowed("rollback"));
        }

        let mut failures = Vec::new();
        let mut skipped = 0_usize;
        for (index, participant) in self.participants.iter_mut().enumerate() {
            if !participant.is_current() {
                tracing::debug!(txn = %self.id, index, "participant changed since commit, skipped");
                skipped += 1;
                continue;
            }
            if let Err(e) = participant.rollback() {
                tracing::warn!(txn = %self.id, index, entity = %e.entity, "rollback failed");
                failures.push(e);
            }
        }
        self.state = TransactionState::RolledBack;

        let failures = self.config.rollback_errors.apply(failures);
        if !failures.is_empty() {
            return Err(CoreError::RollbackFailed {
                txn: self.id,
                failures,
            });
        }

        tracing::debug!(txn = %self.id, label = self.label(), skipped, "transaction rolled back");
        Ok(self)
    }

    fn label(&self) -> &str {
        self.config.label.as_deref().unwrap_or("")
    }

    fn not_allowed(&self, op: &str) -> CoreError {
        CoreError::invalid_operation(format!(
            "cannot {op} transaction {} in state {:?}",
            self.id, self.state
        ))
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entities: Vec<_> = self.participants.iter().map(|p| p.entity_id()).collect();
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("label", &self.config.label)
            .field("entities", &entities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollbackErrorPolicy;
    use crate::entity::{Entity, EntityId};
    use crate::error::StageOp;
    use crate::types::Version;
    use std::any::Any;

    /// Participant with fixed publish outcomes.
    struct Scripted {
        id: EntityId,
        commit_ok: bool,
        rollback_ok: bool,
    }

    impl Scripted {
        /// Every publish conflicts.
        fn stubborn() -> Box<dyn Participant> {
            Box::new(Self {
                id: EntityId::new(),
                commit_ok: false,
                rollback_ok: false,
            })
        }

        /// Commits fine but can never be reverted.
        fn one_way() -> Box<dyn Participant> {
            Box::new(Self {
                id: EntityId::new(),
                commit_ok: true,
                rollback_ok: false,
            })
        }

        fn outcome(&self, ok: bool, op: StageOp) -> Result<Version, ConflictError> {
            if ok {
                return Ok(Version::INITIAL.next());
            }
            Err(ConflictError {
                entity: self.id,
                op,
                observed: Version::INITIAL,
            })
        }
    }

    impl Participant for Scripted {
        fn entity_id(&self) -> EntityId {
            self.id
        }
        fn capture(&mut self) {}
        fn is_current(&self) -> bool {
            true
        }
        fn commit(&mut self) -> Result<Version, ConflictError> {
            self.outcome(self.commit_ok, StageOp::Commit)
        }
        fn rollback(&mut self) -> Result<Version, ConflictError> {
            self.outcome(self.rollback_ok, StageOp::Rollback)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn pair() -> (Entity<String>, Entity<i64>, Transaction) {
        let a = Entity::new("Hello".to_string());
        let b = Entity::new(100_i64);
        let txn = Transaction::new(vec![a.participant(), b.participant()]).unwrap();
        (a, b, txn)
    }

    #[test]
    fn new_transaction_is_unopened() {
        let (_, _, txn) = pair();
        assert_eq!(txn.state(), TransactionState::Unopened);
        assert_eq!(txn.len(), 2);
        assert!(!txn.is_empty());
    }

    #[test]
    fn empty_transaction_is_rejected() {
        let err = Transaction::new(Vec::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn begin_snapshots_live_values() {
        let (a, b, mut txn) = pair();
        a.stage().modify(|s| format!("{s}!")).commit().unwrap();
        txn.begin().unwrap();

        assert_eq!(txn.state(), TransactionState::Open);
        assert_eq!(txn.snapshot::<String>(0).unwrap(), "Hello!");
        assert_eq!(txn.snapshot::<i64>(1).unwrap(), b.get());
    }

    #[test]
    fn modify_before_begin_is_rejected() {
        let (_, _, mut txn) = pair();
        let err = txn.modify(0, |s: &String| s.clone()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn modify_out_of_range() {
        let (_, _, mut txn) = pair();
        txn.begin().unwrap();
        let err = txn.modify(2, |n: &i64| n + 1).unwrap_err();
        assert!(matches!(err, CoreError::IndexOutOfRange { index: 2, len: 2 }));
    }

    #[test]
    fn modify_wrong_type() {
        let (_, _, mut txn) = pair();
        txn.begin().unwrap();
        let err = txn.modify(0, |n: &i64| n + 1).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { index: 0, .. }));
    }

    #[test]
    fn modify_does_not_publish() {
        let (a, b, mut txn) = pair();
        txn.begin()
            .unwrap()
            .modify(0, |s: &String| format!("{s} Senthil"))
            .unwrap()
            .modify(1, |n: &i64| n + 100)
            .unwrap();

        assert_eq!(a.get(), "Hello");
        assert_eq!(b.get(), 100);
        assert_eq!(txn.snapshot::<i64>(1).unwrap(), 100);
    }

    #[test]
    fn commit_publishes_all() {
        let (a, b, mut txn) = pair();
        txn.begin()
            .unwrap()
            .modify(0, |s: &String| format!("{s} Senthil"))
            .unwrap()
            .modify(1, |n: &i64| n + 100)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(a.get(), "Hello Senthil");
        assert_eq!(b.get(), 200);
        assert_eq!(txn.snapshot::<i64>(1).unwrap(), 200);
    }

    #[test]
    fn cannot_commit_twice() {
        let (_, _, mut txn) = pair();
        txn.begin().unwrap().commit().unwrap();
        assert!(txn.commit().is_err());
    }

    #[test]
    fn commit_rollback_restores_everything() {
        let (a, b, mut txn) = pair();
        txn.begin()
            .unwrap()
            .modify(0, |s: &String| format!("{s} Senthil"))
            .unwrap()
            .modify(1, |n: &i64| n + 100)
            .unwrap()
            .commit()
            .unwrap()
            .rollback()
            .unwrap();

        assert_eq!(txn.state(), TransactionState::RolledBack);
        assert_eq!(a.get(), "Hello");
        assert_eq!(b.get(), 100);
    }

    #[test]
    fn rollback_requires_commit() {
        let (_, _, mut txn) = pair();
        txn.begin().unwrap();
        assert!(matches!(
            txn.rollback().unwrap_err(),
            CoreError::InvalidOperation { .. }
        ));
    }

    #[test]
    fn aborted_transaction_is_terminal() {
        let (_, b, mut txn) = pair();
        txn.begin().unwrap().modify(1, |n: &i64| n - 50).unwrap();
        b.stage().modify(|n| n + 50).commit().unwrap();

        let err = txn.commit().unwrap_err();
        assert!(err.is_abort());
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(txn.begin().is_err());
        assert!(txn.commit().is_err());
        assert!(txn.rollback().is_err());
    }

    #[test]
    fn validation_abort_uses_retry_reason() {
        let (_, b, mut txn) = pair();
        txn.begin().unwrap();
        b.stage().modify(|n| n + 1).commit().unwrap();

        match txn.commit().unwrap_err() {
            CoreError::TransactionAborted {
                failed_at,
                reason,
                conflict,
                ..
            } => {
                assert_eq!(failed_at, 1);
                assert_eq!(reason, RETRY_REASON);
                assert!(conflict.is_none());
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn publish_conflict_is_wrapped_in_abort() {
        let a = Entity::new(1_i32);
        let stubborn = Scripted::stubborn();
        let stubborn_id = stubborn.entity_id();
        let mut txn = Transaction::new(vec![a.participant(), stubborn]).unwrap();
        txn.begin().unwrap().modify(0, |n: &i32| n + 1).unwrap();

        let err = txn.commit().unwrap_err();
        assert_eq!(err.conflict().map(|c| c.entity), Some(stubborn_id));
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn compensation_failures_are_reported() {
        let one_way = Scripted::one_way();
        let one_way_id = one_way.entity_id();
        let b = Entity::new(2_i32);
        let mut txn = Transaction::new(vec![one_way, b.participant()]).unwrap();
        txn.begin().unwrap().modify(1, |n: &i32| n + 10).unwrap();
        b.stage().modify(|n| n * 2).commit().unwrap();

        match txn.commit().unwrap_err() {
            CoreError::TransactionAborted {
                compensation_failures,
                failed_at,
                conflict,
                ..
            } => {
                assert_eq!(failed_at, 1);
                assert!(conflict.is_none());
                assert_eq!(compensation_failures.len(), 1);
                assert_eq!(compensation_failures[0].entity, one_way_id);
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(b.get(), 4);
    }

    #[test]
    fn failure_point_leaves_later_participants_untouched() {
        let a = Entity::new(1_i32);
        let c = Entity::new(3_i32);
        let mut txn =
            Transaction::new(vec![a.participant(), Scripted::stubborn(), c.participant()])
                .unwrap();
        txn.begin()
            .unwrap()
            .modify(0, |n: &i32| n + 1)
            .unwrap()
            .modify(2, |n: &i32| n + 1)
            .unwrap();

        assert!(txn.commit().unwrap_err().is_abort());
        assert_eq!(a.get(), 1);
        assert_eq!(c.get(), 3);
        assert_eq!(c.version(), Version::INITIAL);
    }

    #[test]
    fn rollback_aggregates_failures_by_default() {
        let a = Entity::new(1_i32);
        let mut txn =
            Transaction::new(vec![Scripted::stubborn(), a.participant(), Scripted::stubborn()]).unwrap();
        txn.state = TransactionState::Committed;

        match txn.rollback().unwrap_err() {
            CoreError::RollbackFailed { failures, .. } => assert_eq!(failures.len(), 2),
            other => panic!("expected rollback failure, got {other:?}"),
        }
        assert_eq!(txn.state(), TransactionState::RolledBack);
    }

    #[test]
    fn rollback_last_wins_keeps_last_failure() {
        let first = Scripted::stubborn();
        let last = Scripted::stubborn();
        let last_id = last.entity_id();
        let config = Config::new().rollback_errors(RollbackErrorPolicy::LastWins);
        let mut txn = Transaction::with_config(vec![first, last], config).unwrap();
        txn.state = TransactionState::Committed;

        match txn.rollback().unwrap_err() {
            CoreError::RollbackFailed { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].entity, last_id);
            }
            other => panic!("expected rollback failure, got {other:?}"),
        }
    }

    #[test]
    fn rollback_continues_past_failures() {
        let a = Entity::new(1_i32);
        let mut txn = Transaction::new(vec![Scripted::stubborn(), a.participant()]).unwrap();
        txn.begin().unwrap();
        txn.modify(1, |n: &i32| n + 1).unwrap();
        // bypass commit: the stubborn participant would abort it
        txn.participants[1].commit().unwrap();
        txn.state = TransactionState::Committed;

        assert!(txn.rollback().is_err());
        assert_eq!(a.get(), 1);
    }

    #[test]
    fn debug_lists_entities() {
        let (a, _, txn) = pair();
        let debug = format!("{txn:?}");
        assert!(debug.contains(&a.id().to_string()));
    }

    #[test]
    fn custom_participant_commits_but_cannot_be_staged() {
        let a = Entity::new(1_i32);
        let mut txn = Transaction::new(vec![a.participant(), Scripted::one_way()]).unwrap();
        txn.begin().unwrap();

        let err = txn.modify(1, |n: &i32| n + 1).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { index: 1, .. }));
        let err = txn.snapshot::<i32>(1).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { index: 1, .. }));

        txn.modify(0, |n: &i32| n + 1).unwrap();
        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert_eq!(a.get(), 2);
    }
}
