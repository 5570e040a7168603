//! Shared published cell.

use super::{EntityId, Stage};
use crate::error::{ConflictError, StageOp};
use crate::types::Version;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// The value every reader sees, with its publish counter.
#[derive(Debug)]
struct Published<T> {
    value: T,
    version: Version,
}

#[derive(Debug)]
struct Shared<T> {
    id: EntityId,
    cell: RwLock<Published<T>>,
}

/// A versioned mutable cell with optimistic commit and rollback.
///
/// `Entity` is a cheap handle: clones refer to the same cell. Reads always
/// return the live published value. Writes go through a [`Stage`], which
/// records the value it based its proposal on and publishes only if the
/// cell still holds that value.
///
/// ## Example
///
/// ```rust
/// use optimist_core::Entity;
///
/// let greeting = Entity::new(String::from("Hello"));
/// let mut stage = greeting.stage();
///
/// stage.modify(|s| format!("{s} X")).commit().unwrap();
/// assert_eq!(greeting.get(), "Hello X");
///
/// stage.rollback().unwrap();
/// assert_eq!(greeting.get(), "Hello");
/// ```
pub struct Entity<T> {
    inner: Arc<Shared<T>>,
}

impl<T> Entity<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates an entity holding `initial`.
    pub fn new(initial: T) -> Self {
        let id = EntityId::new();
        tracing::trace!(entity = %id, "entity created");
        Self {
            inner: Arc::new(Shared {
                id,
                cell: RwLock::new(Published {
                    value: initial,
                    version: Version::INITIAL,
                }),
            }),
        }
    }

    /// Returns the entity ID.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    /// Returns the version of the live value.
    #[must_use]
    pub fn version(&self) -> Version {
        self.inner.cell.read().version
    }

    /// Passes the live value to `action`.
    ///
    /// Never fails and never sees staged proposals. `action` receives a copy
    /// taken after the guard is released, so it may stage, commit or read
    /// this entity again.
    pub fn read(&self, action: impl FnOnce(&T)) -> &Self {
        let value = self.get();
        action(&value);
        self
    }

    /// Returns a copy of the live value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.cell.read().value.clone()
    }

    /// Opens a new stage based on the live value.
    #[must_use]
    pub fn stage(&self) -> Stage<T> {
        Stage::new(self.clone(), self.get())
    }

    /// Returns true if both handles refer to the same cell.
    #[must_use]
    pub fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns true if the live value equals `expected`.
    pub(crate) fn holds(&self, expected: &T) -> bool {
        self.inner.cell.read().value == *expected
    }

    /// Publishes `next` if the live value still equals `expected`.
    ///
    /// The comparison and the overwrite happen under one write guard.
    pub(crate) fn compare_and_publish(
        &self,
        expected: &T,
        next: T,
        op: StageOp,
    ) -> Result<Version, ConflictError> {
        let mut cell = self.inner.cell.write();
        if cell.value != *expected {
            return Err(ConflictError {
                entity: self.inner.id,
                op,
                observed: cell.version,
            });
        }
        cell.value = next;
        cell.version = cell.version.next();
        Ok(cell.version)
    }
}

impl<T> Clone for Entity<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Entity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.inner.cell.read();
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("value", &cell.value)
            .field("version", &cell.version)
            .finish()
    }
}
