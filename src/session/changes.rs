//! Writes collected from the change tracker and replayed inside a commit
//! transaction.

use std::ops::AddAssign;

use async_trait::async_trait;
use sea_orm::sea_query::{Expr, IntoValueTuple, ValueTuple};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, DbErr, Iterable, ModelTrait,
    QueryFilter,
};
use tracing::{debug, warn};

use super::entity_set::{ChangeTracker, EntitySet};
use super::tracked::EntityState;
use crate::entity::{
    EntityDescriptor, EntityKey, UNASSIGNED_KEY, changed_columns, entity_name, key_column,
    key_from_value, value_columns,
};
use crate::error::{ConflictKind, RepositoryError, RepositoryResult};

/// Number of rows written by a successful commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl AddAssign for CommitSummary {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// Writes of one entity type awaiting a commit.
#[async_trait]
pub(crate) trait PendingChanges: Send {
    /// Executes inserts and updates.
    async fn write(&mut self, txn: &DatabaseTransaction) -> RepositoryResult<()>;

    /// Executes deletes.
    async fn delete(&mut self, txn: &DatabaseTransaction) -> RepositoryResult<()>;

    /// Folds the written rows back into the tracker once the transaction
    /// has committed.
    fn accept(self: Box<Self>, tracker: &mut ChangeTracker) -> CommitSummary;
}

struct PendingUpdate<E: EntityDescriptor> {
    entry: u64,
    key: EntityKey,
    values: E::Model,
    columns: Vec<E::Column>,
}

pub(crate) struct ChangeSet<E: EntityDescriptor> {
    key_column: E::Column,
    inserts: Vec<(u64, E::Model)>,
    updates: Vec<PendingUpdate<E>>,
    deletes: Vec<(u64, EntityKey)>,
    stored: Vec<(u64, E::Model)>,
}

impl<E: EntityDescriptor> ChangeSet<E> {
    /// Snapshots every pending change of `set`.
    ///
    /// Unchanged instances are compared column by column with their original
    /// values and only the differing columns are written. Instances
    /// registered as modified have all value columns written.
    pub(crate) fn collect(set: &EntitySet<E>) -> RepositoryResult<Self> {
        let key_column = key_column::<E>()?;
        let mut changes = Self {
            key_column,
            inserts: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
            stored: Vec::new(),
        };

        for (id, entry) in set.entries() {
            match entry.state {
                EntityState::Added => changes.inserts.push((id, entry.instance.snapshot())),
                EntityState::Deleted => {
                    if let Some(key) = entry.key {
                        changes.deletes.push((id, key));
                    }
                }
                EntityState::Modified => {
                    if let Some(key) = entry.key {
                        changes.updates.push(PendingUpdate {
                            entry: id,
                            key,
                            values: entry.instance.snapshot(),
                            columns: value_columns::<E>(key_column),
                        });
                    }
                }
                EntityState::Unchanged => {
                    let (Some(key), Some(original)) = (entry.key, entry.original.as_ref()) else {
                        continue;
                    };
                    let values = entry.instance.snapshot();
                    let columns = changed_columns::<E>(key_column, original, &values);
                    if !columns.is_empty() {
                        changes.updates.push(PendingUpdate {
                            entry: id,
                            key,
                            values,
                            columns,
                        });
                    }
                }
            }
        }

        Ok(changes)
    }

    fn conflict(key: EntityKey, operation: ConflictKind) -> RepositoryError {
        warn!(entity = %entity_name::<E>(), key, %operation, "write affected no rows");
        RepositoryError::Conflict {
            entity: entity_name::<E>(),
            key,
            operation,
        }
    }
}

#[async_trait]
impl<E: EntityDescriptor> PendingChanges for ChangeSet<E> {
    async fn write(&mut self, txn: &DatabaseTransaction) -> RepositoryResult<()> {
        for (entry, values) in &self.inserts {
            let stored = insert_row::<E>(txn, self.key_column, values).await?;
            self.stored.push((*entry, stored));
        }

        for update in &self.updates {
            if update.columns.is_empty() {
                continue;
            }

            let mut statement = E::update_many().filter(self.key_column.eq(update.key));
            for column in &update.columns {
                statement = statement.col_expr(*column, Expr::value(update.values.get(*column)));
            }

            let result = statement.exec(txn).await?;
            if result.rows_affected == 0 {
                return Err(Self::conflict(update.key, ConflictKind::Update));
            }
        }

        Ok(())
    }

    async fn delete(&mut self, txn: &DatabaseTransaction) -> RepositoryResult<()> {
        for (_, key) in &self.deletes {
            let result = E::delete_many()
                .filter(self.key_column.eq(*key))
                .exec(txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(Self::conflict(*key, ConflictKind::Delete));
            }
        }

        Ok(())
    }

    fn accept(self: Box<Self>, tracker: &mut ChangeTracker) -> CommitSummary {
        let changes = *self;
        let summary = CommitSummary {
            inserted: changes.stored.len(),
            updated: changes.updates.len(),
            deleted: changes.deletes.len(),
        };

        let set = tracker.set_mut::<E>();
        for (entry, stored) in changes.stored {
            set.accept_insert(entry, stored);
        }
        for update in changes.updates {
            set.accept_update(update.entry, update.values);
        }
        for (entry, _) in changes.deletes {
            set.accept_delete(entry);
        }

        debug!(
            entity = %entity_name::<E>(),
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "accepted committed changes"
        );
        summary
    }
}

/// Inserts one row and reads it back, so store-side defaults and the
/// generated key reach the tracked instance.
async fn insert_row<E: EntityDescriptor>(
    txn: &DatabaseTransaction,
    key_column: E::Column,
    values: &E::Model,
) -> RepositoryResult<E::Model> {
    let requested = E::key(values);

    let mut active = <E::Active as ActiveModelTrait>::default();
    for column in E::Column::iter() {
        active.set(column, values.get(column));
    }
    if requested == UNASSIGNED_KEY {
        active.not_set(key_column);
    }

    let result = E::insert(active).exec(txn).await?;
    let key = if requested == UNASSIGNED_KEY {
        match result.last_insert_id.into_value_tuple() {
            ValueTuple::One(value) => key_from_value(value),
            _ => None,
        }
        .ok_or(DbErr::RecordNotInserted)?
    } else {
        requested
    };

    E::find()
        .filter(key_column.eq(key))
        .one(txn)
        .await?
        .ok_or_else(|| {
            RepositoryError::Database(DbErr::RecordNotFound(format!(
                "inserted `{}` row with key {key}",
                entity_name::<E>()
            )))
        })
}
