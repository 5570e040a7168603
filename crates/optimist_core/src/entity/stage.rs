//! Caller-owned staging pair.

use super::Entity;
use crate::error::{ConflictError, CoreResult, StageOp};
use crate::types::Version;
use std::fmt;
use std::mem;

/// Staged, unpublished state of one caller against one entity.
///
/// A stage holds two values:
/// - *prior*: the value this stage believes is published
/// - *pending*: the value it proposes to publish next
///
/// [`commit`](Self::commit) publishes *pending* only if the entity still
/// holds *prior*, then swaps the two. The swapped pair is a one-step undo
/// buffer, so [`rollback`](Self::rollback) (same check, same swap) reverts
/// the commit. Alternating the two toggles the entity between two values.
///
/// Stages are not shared: each caller opens its own with
/// [`Entity::stage`]. Dropping a stage discards anything it had staged.
pub struct Stage<T> {
    entity: Entity<T>,
    prior: T,
    pending: T,
}

impl<T> Stage<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(entity: Entity<T>, base: T) -> Self {
        Self {
            entity,
            prior: base.clone(),
            pending: base,
        }
    }

    /// Returns the entity this stage writes to.
    #[must_use]
    pub fn entity(&self) -> &Entity<T> {
        &self.entity
    }

    /// Returns the value this stage believes is published.
    #[must_use]
    pub fn prior(&self) -> &T {
        &self.prior
    }

    /// Returns the value this stage would publish next.
    #[must_use]
    pub fn pending(&self) -> &T {
        &self.pending
    }

    /// Stages `f` applied to the live value.
    ///
    /// Nothing is published.
    pub fn modify(&mut self, f: impl FnOnce(&T) -> T) -> &mut Self {
        let observed = self.entity.get();
        self.modify_from(observed, f)
    }

    /// Stages `f` applied to an already observed live value.
    pub(crate) fn modify_from(&mut self, observed: T, f: impl FnOnce(&T) -> T) -> &mut Self {
        self.pending = f(&observed);
        self.prior = observed;
        tracing::trace!(entity = %self.entity.id(), "staged");
        self
    }

    /// Re-bases both slots on the live value, dropping any proposal.
    pub(crate) fn reset(&mut self) {
        let live = self.entity.get();
        self.prior = live.clone();
        self.pending = live;
    }

    /// Publishes the pending value.
    ///
    /// Fails with [`CoreError::Conflict`](crate::CoreError::Conflict) if the
    /// entity was published by someone else since this stage last touched
    /// it.
    pub fn commit(&mut self) -> CoreResult<&mut Self> {
        self.publish(StageOp::Commit)?;
        Ok(self)
    }

    /// Publishes the prior value back, undoing the last commit.
    ///
    /// Same validation as [`commit`](Self::commit).
    pub fn rollback(&mut self) -> CoreResult<&mut Self> {
        self.publish(StageOp::Rollback)?;
        Ok(self)
    }

    /// Checked publish of *pending* followed by the swap.
    pub(crate) fn publish(&mut self, op: StageOp) -> Result<Version, ConflictError> {
        match self
            .entity
            .compare_and_publish(&self.prior, self.pending.clone(), op)
        {
            Ok(version) => {
                mem::swap(&mut self.prior, &mut self.pending);
                tracing::trace!(entity = %self.entity.id(), %version, %op, "published");
                Ok(version)
            }
            Err(conflict) => {
                tracing::warn!(
                    entity = %conflict.entity,
                    observed = %conflict.observed,
                    %op,
                    "dirty read"
                );
                Err(conflict)
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Stage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("entity", &self.entity)
            .field("prior", &self.prior)
            .field("pending", &self.pending)
            .finish()
    }
}
