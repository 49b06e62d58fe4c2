//! Shared handles to tracked entity instances.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Lifecycle state of an instance registered with a session.
///
/// An instance the session does not know about has no state at all; the
/// session reports it as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Matches the stored row as of the last load or commit.
    Unchanged,
    /// Will be inserted on commit.
    Added,
    /// Every value column will be written on commit.
    Modified,
    /// Will be deleted on commit.
    Deleted,
}

/// Handle to an entity instance owned by a session.
///
/// Clones share the same instance: a mutation made through one handle is
/// visible through every other handle and to the session's change detection.
#[derive(Debug)]
pub struct Tracked<M> {
    inner: Arc<RwLock<M>>,
}

impl<M> Clone for Tracked<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> Tracked<M> {
    pub(crate) fn new(model: M) -> Self {
        Self {
            inner: Arc::new(RwLock::new(model)),
        }
    }

    /// Borrows the instance for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, M> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrows the instance for mutation.
    ///
    /// Do not hold the guard across an `.await`.
    pub fn write(&self) -> RwLockWriteGuard<'_, M> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether both handles refer to the very same instance.
    pub fn same_instance(&self, other: &Tracked<M>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<M: Clone> Tracked<M> {
    /// Returns a detached copy of the current values.
    pub fn snapshot(&self) -> M {
        self.read().clone()
    }
}
