//! # Session
//!
//! Unit of work shared by every repository created from it. The session
//! owns an identity map per entity type (one live instance per key), records
//! the lifecycle state of each tracked instance and writes all pending
//! changes in a single transaction on [`Session::commit`].
//!
//! Reads through [`GenericRepository`](crate::repositories::GenericRepository)
//! do not register anything here; only the explicit registration calls and
//! [`Session::find`] do.
//!
//! A session is meant to be driven by one logical owner. Its methods take
//! `&self` so repositories can borrow it, but calls should not be
//! interleaved from concurrent tasks.

mod changes;
mod entity_set;
mod tracked;

use std::sync::{Mutex, MutexGuard, PoisonError};

use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, TransactionTrait};
use tracing::{debug, info};

pub use changes::CommitSummary;
pub use tracked::{EntityState, Tracked};

use crate::entity::{EntityDescriptor, EntityKey, UNASSIGNED_KEY, entity_name, key_column};
use crate::error::{RepositoryError, RepositoryResult};
use entity_set::{ChangeTracker, TrackedSet};

/// How a detached instance handed to an update was taken into the session.
#[derive(Debug, Clone)]
pub enum UpdateResolution<M> {
    /// An instance with the same key was already tracked, or could be read
    /// from the store; its values were overwritten by the detached ones.
    Merged(Tracked<M>),
    /// No instance with that key was known; the detached values were
    /// registered as a new tracked instance.
    Registered(Tracked<M>),
}

impl<M> UpdateResolution<M> {
    /// The tracked instance now holding the updated values.
    pub fn tracked(&self) -> &Tracked<M> {
        match self {
            UpdateResolution::Merged(tracked) | UpdateResolution::Registered(tracked) => tracked,
        }
    }

    pub fn into_tracked(self) -> Tracked<M> {
        match self {
            UpdateResolution::Merged(tracked) | UpdateResolution::Registered(tracked) => tracked,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, UpdateResolution::Merged(_))
    }
}

/// Unit of work over one database connection.
pub struct Session {
    db: DatabaseConnection,
    tracker: Mutex<ChangeTracker>,
}

impl Session {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            tracker: Mutex::new(ChangeTracker::default()),
        }
    }

    /// Connection used for reads and commits.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // The guard must never be held across an `.await`.
    fn tracker(&self) -> MutexGuard<'_, ChangeTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the tracked instance of `E` with `key`, without touching the
    /// store.
    pub fn tracked<E: EntityDescriptor>(&self, key: EntityKey) -> Option<Tracked<E::Model>> {
        let tracker = self.tracker();
        tracker
            .set::<E>()
            .and_then(|set| set.by_key(key))
            .map(|entry| entry.instance.clone())
    }

    /// Returns the instance of `E` with `key`, reading it from the store and
    /// attaching it as unchanged when it is not tracked yet.
    ///
    /// # Errors
    ///
    /// Fails when `E` has no single integer key or the read fails.
    pub async fn find<E: EntityDescriptor>(
        &self,
        key: EntityKey,
    ) -> RepositoryResult<Option<Tracked<E::Model>>> {
        let key_column = key_column::<E>()?;
        if let Some(instance) = self.tracked::<E>(key) {
            return Ok(Some(instance));
        }
        if key == UNASSIGNED_KEY {
            return Ok(None);
        }

        let stored = E::find()
            .filter(key_column.eq(key))
            .one(&self.db)
            .await?;

        match stored {
            Some(model) => self.attach::<E>(model).map(Some),
            None => Ok(None),
        }
    }

    /// Registers a new instance to be inserted on commit.
    ///
    /// An instance whose key is [`UNASSIGNED_KEY`] gets its key from the
    /// store; any other key is inserted as given.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::AlreadyTracked`] when an instance with the
    /// same key is already tracked.
    pub fn add<E: EntityDescriptor>(&self, model: E::Model) -> RepositoryResult<Tracked<E::Model>> {
        let key = E::key(&model);
        let instance = self
            .tracker()
            .set_mut::<E>()
            .register(model, EntityState::Added, None)?;

        debug!(entity = %entity_name::<E>(), key, "registered instance for insert");
        Ok(instance)
    }

    /// Starts tracking an instance that already exists in the store.
    ///
    /// The instance is recorded as unchanged; later mutations are picked up
    /// by change detection. An instance without an assigned key cannot
    /// exist in the store and is registered for insert instead.
    pub fn attach<E: EntityDescriptor>(
        &self,
        model: E::Model,
    ) -> RepositoryResult<Tracked<E::Model>> {
        if E::key(&model) == UNASSIGNED_KEY {
            return self.add::<E>(model);
        }

        let key = E::key(&model);
        let original = model.clone();
        let instance = self.tracker().set_mut::<E>().register(
            model,
            EntityState::Unchanged,
            Some(original),
        )?;

        debug!(entity = %entity_name::<E>(), key, "attached instance");
        Ok(instance)
    }

    /// Starts tracking a detached instance whose values should overwrite the
    /// stored row. Every value column is written on commit.
    pub fn attach_modified<E: EntityDescriptor>(
        &self,
        model: E::Model,
    ) -> RepositoryResult<Tracked<E::Model>> {
        if E::key(&model) == UNASSIGNED_KEY {
            return self.add::<E>(model);
        }

        let key = E::key(&model);
        let instance = self
            .tracker()
            .set_mut::<E>()
            .register(model, EntityState::Modified, None)?;

        debug!(entity = %entity_name::<E>(), key, "attached instance as modified");
        Ok(instance)
    }

    /// Forces every value column of a tracked, unchanged instance to be
    /// written on commit. Added and deleted instances keep their state.
    pub fn mark_modified<E: EntityDescriptor>(
        &self,
        instance: &Tracked<E::Model>,
    ) -> RepositoryResult<EntityState> {
        let mut tracker = self.tracker();
        let set = tracker.set_mut::<E>();
        let entry = set
            .position_of(instance)
            .and_then(|id| set.entry_mut(id))
            .ok_or_else(not_tracked::<E>)?;

        if entry.state == EntityState::Unchanged {
            entry.state = EntityState::Modified;
        }
        Ok(entry.state)
    }

    /// Schedules a tracked instance for deletion.
    ///
    /// An instance that was only added is simply forgotten, as the store has
    /// never seen it.
    pub fn remove<E: EntityDescriptor>(&self, instance: &Tracked<E::Model>) -> RepositoryResult<()> {
        let mut tracker = self.tracker();
        let set = tracker.set_mut::<E>();
        let id = set.position_of(instance).ok_or_else(not_tracked::<E>)?;

        let added = set
            .entry_mut(id)
            .map(|entry| {
                let added = entry.state == EntityState::Added;
                if !added {
                    entry.state = EntityState::Deleted;
                }
                added
            })
            .unwrap_or(false);
        if added {
            set.remove(id);
        }

        debug!(entity = %entity_name::<E>(), added, "removed instance");
        Ok(())
    }

    /// Stops tracking an instance without scheduling any write.
    ///
    /// Returns whether the instance was tracked.
    pub fn detach<E: EntityDescriptor>(&self, instance: &Tracked<E::Model>) -> bool {
        let mut tracker = self.tracker();
        let set = tracker.set_mut::<E>();
        match set.position_of(instance) {
            Some(id) => set.remove(id).is_some(),
            None => false,
        }
    }

    /// Current state of a tracked instance, or `None` when it is detached.
    pub fn state_of<E: EntityDescriptor>(&self, instance: &Tracked<E::Model>) -> Option<EntityState> {
        let tracker = self.tracker();
        let set = tracker.set::<E>()?;
        let id = set.position_of(instance)?;
        set.entry(id).map(|entry| entry.current_state())
    }

    /// Current state of the instance tracked under `key`.
    pub fn state_of_key<E: EntityDescriptor>(&self, key: EntityKey) -> Option<EntityState> {
        let tracker = self.tracker();
        tracker
            .set::<E>()
            .and_then(|set| set.by_key(key))
            .map(|entry| entry.current_state())
    }

    /// Number of tracked instances of `E`.
    pub fn tracked_count<E: EntityDescriptor>(&self) -> usize {
        let tracker = self.tracker();
        tracker.set::<E>().map(|set| set.len()).unwrap_or(0)
    }

    /// Number of tracked instances across all entity types.
    pub fn total_tracked(&self) -> usize {
        self.tracker().len()
    }

    /// Whether a commit would write anything.
    pub fn has_changes(&self) -> bool {
        self.tracker().has_changes()
    }

    /// Forgets every tracked instance and pending change.
    pub fn clear(&self) {
        *self.tracker() = ChangeTracker::default();
    }

    /// Writes every pending change in one transaction.
    ///
    /// Inserts and updates run per entity type in the order the types were
    /// first touched; deletes run afterwards in reverse order, so dependents
    /// registered after their parents are removed first. When the
    /// transaction commits, inserted instances receive their stored values
    /// and every written instance becomes unchanged. When anything fails the
    /// transaction is rolled back and tracking state is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when an update or delete finds
    /// no row, or the database error that aborted the transaction.
    pub async fn commit(&self) -> RepositoryResult<CommitSummary> {
        let mut pending = self.tracker().prepare()?;
        if pending.is_empty() {
            debug!("commit skipped, no pending changes");
            return Ok(CommitSummary::default());
        }

        let txn = self.db.begin().await?;
        for changes in pending.iter_mut() {
            changes.write(&txn).await?;
        }
        for changes in pending.iter_mut().rev() {
            changes.delete(&txn).await?;
        }
        txn.commit().await?;

        let mut summary = CommitSummary::default();
        {
            let mut tracker = self.tracker();
            for changes in pending {
                summary += changes.accept(&mut tracker);
            }
        }

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "session committed"
        );
        Ok(summary)
    }
}

fn not_tracked<E: EntityDescriptor>() -> RepositoryError {
    RepositoryError::NotTracked {
        entity: entity_name::<E>(),
    }
}
