//! Type-erased transaction participants.

use crate::entity::{Entity, EntityId, Stage};
use crate::error::{ConflictError, StageOp};
use crate::types::Version;
use std::any::Any;

/// One slot of a [`Transaction`](crate::Transaction).
///
/// A participant pairs an entity with the transaction's own stage for it and
/// the transaction's snapshot of its value. The trait erases the payload
/// type so a single transaction can span entities of different types.
///
/// [`Entity::participant`] builds the standard implementation. Custom
/// implementations must keep the contract below; the transaction relies on
/// it for its all-or-nothing guarantee.
///
/// Custom participants only take part in validation, commit and rollback.
/// [`Transaction::modify`](crate::Transaction::modify) and
/// [`Transaction::snapshot`](crate::Transaction::snapshot) recognise the
/// standard implementation only and return
/// [`CoreError::TypeMismatch`](crate::CoreError::TypeMismatch) for anything
/// else.
pub trait Participant: Send {
    /// The entity behind this slot.
    fn entity_id(&self) -> EntityId;

    /// Records the live value as the snapshot and drops anything staged.
    fn capture(&mut self);

    /// Returns true if the live value equals the snapshot.
    fn is_current(&self) -> bool;

    /// Publishes the staged value and records it as the new snapshot.
    fn commit(&mut self) -> Result<Version, ConflictError>;

    /// Publishes the previous value back and records it as the snapshot.
    fn rollback(&mut self) -> Result<Version, ConflictError>;

    /// Upcast used to recover the typed slot.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast used to recover the typed slot.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Standard participant over an [`Entity<T>`].
pub(crate) struct Slot<T> {
    stage: Stage<T>,
    snapshot: T,
}

impl<T> Slot<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn new(entity: &Entity<T>) -> Self {
        let stage = entity.stage();
        let snapshot = stage.prior().clone();
        Self { stage, snapshot }
    }

    /// Stages `f` on the live value, which also becomes the snapshot.
    pub(crate) fn stage_with(&mut self, f: impl FnOnce(&T) -> T) {
        let observed = self.stage.entity().get();
        self.snapshot = observed.clone();
        self.stage.modify_from(observed, f);
    }

    pub(crate) fn snapshot(&self) -> &T {
        &self.snapshot
    }

    fn publish(&mut self, op: StageOp) -> Result<Version, ConflictError> {
        let version = self.stage.publish(op)?;
        // after the swap, prior is the value just published
        self.snapshot = self.stage.prior().clone();
        Ok(version)
    }
}

impl<T> Participant for Slot<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn entity_id(&self) -> EntityId {
        self.stage.entity().id()
    }

    fn capture(&mut self) {
        self.stage.reset();
        self.snapshot = self.stage.prior().clone();
    }

    fn is_current(&self) -> bool {
        self.stage.entity().holds(&self.snapshot)
    }

    fn commit(&mut self) -> Result<Version, ConflictError> {
        self.publish(StageOp::Commit)
    }

    fn rollback(&mut self) -> Result<Version, ConflictError> {
        self.publish(StageOp::Rollback)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T> Entity<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Wraps this entity as a transaction participant.
    #[must_use]
    pub fn participant(&self) -> Box<dyn Participant> {
        Box::new(Slot::new(self))
    }
}
