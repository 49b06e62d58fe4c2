//! Generic repository for any entity with a single integer key
//!
//! This module provides the GenericRepository struct which offers the same
//! read and write operations for every entity implementing
//! [`EntityDescriptor`]. Lookups by key and full listings return detached
//! models. Filtered reads and writes go through the shared [`Session`];
//! writes reach the store on [`Session::commit`].

use std::marker::PhantomData;

use sea_orm::sea_query::IntoCondition;
use sea_orm::{ColumnTrait, QueryFilter, QueryOrder};
use tracing::debug;

use super::include::{Include, load_related, shape_query};
use crate::entity::{EntityDescriptor, EntityKey, UNASSIGNED_KEY, entity_name, key_column};
use crate::error::{RepositoryError, RepositoryResult};
use crate::session::{EntityState, Session, Tracked, UpdateResolution};

/// Repository for entities of type `E`, backed by a shared session
pub struct GenericRepository<'s, E: EntityDescriptor> {
    session: &'s Session,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityDescriptor> Clone for GenericRepository<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: EntityDescriptor> Copy for GenericRepository<'_, E> {}

impl<'s, E: EntityDescriptor> GenericRepository<'s, E> {
    /// Creates a new GenericRepository instance
    ///
    /// # Arguments
    ///
    /// * `session` - Session shared by every repository of the same unit of work
    pub fn new(session: &'s Session) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Name of the primary key column of `E`
    ///
    /// # Returns
    ///
    /// Returns the column name, or `InvalidKeyShape` when `E` has no single
    /// integer key
    pub fn key_property_name(&self) -> RepositoryResult<String> {
        crate::entity::key_property_name::<E>()
    }

    /// Finds an entity by its key without tracking it
    ///
    /// # Arguments
    ///
    /// * `id` - Primary key value
    /// * `includes` - Related data to load into navigation fields
    ///
    /// # Returns
    ///
    /// Returns the detached model if a row has that key, `None` otherwise
    pub async fn get_by_id(
        &self,
        id: EntityKey,
        includes: &[&dyn Include<E>],
    ) -> RepositoryResult<Option<E::Model>> {
        let key_column = key_column::<E>()?;
        let db = self.session.connection();

        let found = shape_query(E::find(), includes)
            .filter(key_column.eq(id))
            .one(db)
            .await?;

        let Some(model) = found else {
            return Ok(None);
        };

        let mut models = vec![model];
        load_related(db, includes, &mut models).await?;
        Ok(models.pop())
    }

    /// Lists every entity without tracking, ordered by key
    pub async fn get_all(&self, includes: &[&dyn Include<E>]) -> RepositoryResult<Vec<E::Model>> {
        let key_column = key_column::<E>()?;
        let db = self.session.connection();

        let mut models = shape_query(E::find(), includes)
            .order_by_asc(key_column)
            .all(db)
            .await?;

        load_related(db, includes, &mut models).await?;
        Ok(models)
    }

    /// Lists the entities matching `filter` as tracked instances
    ///
    /// Rows the session already tracks resolve to the tracked instance, whose
    /// column values are kept; any navigation loaded by `includes` is filled
    /// in on it. Other rows are attached as unchanged, so mutations made
    /// through the returned handles are written on the next commit.
    ///
    /// # Arguments
    ///
    /// * `filter` - Condition over the columns of `E`
    /// * `includes` - Related data to load into navigation fields
    ///
    /// # Returns
    ///
    /// Returns the matching instances ordered by key
    pub async fn get_by_filter<F>(
        &self,
        filter: F,
        includes: &[&dyn Include<E>],
    ) -> RepositoryResult<Vec<Tracked<E::Model>>>
    where
        F: IntoCondition,
    {
        let key_column = key_column::<E>()?;
        let db = self.session.connection();

        let mut models = shape_query(E::find().filter(filter), includes)
            .order_by_asc(key_column)
            .all(db)
            .await?;

        load_related(db, includes, &mut models).await?;

        let mut tracked = Vec::with_capacity(models.len());
        for model in models {
            let instance = match self.session.tracked::<E>(E::key(&model)) {
                Some(existing) => {
                    if !includes.is_empty() {
                        let mut loaded = model;
                        E::apply_values(&mut loaded, &existing.read());
                        *existing.write() = loaded;
                    }
                    existing
                }
                None => self.session.attach::<E>(model)?,
            };
            tracked.push(instance);
        }

        debug!(entity = %entity_name::<E>(), count = tracked.len(), "filtered instances tracked");
        Ok(tracked)
    }

    /// Registers a new entity to be inserted on the next commit
    ///
    /// # Returns
    ///
    /// Returns the tracked instance; its key is filled in once committed
    pub fn create(&self, model: E::Model) -> RepositoryResult<Tracked<E::Model>> {
        key_column::<E>()?;
        self.session.add::<E>(model)
    }

    /// Schedules a detached entity for update
    ///
    /// When an instance with the same key is tracked, or can be read from
    /// the store, the detached values are copied onto it and only the
    /// columns that actually differ are written. Otherwise the detached
    /// values are registered as a modified instance. A model without an
    /// assigned key is registered for insert.
    pub async fn update(&self, model: E::Model) -> RepositoryResult<UpdateResolution<E::Model>> {
        key_column::<E>()?;
        let key = E::key(&model);
        if key == UNASSIGNED_KEY {
            return self.session.add::<E>(model).map(UpdateResolution::Registered);
        }

        match self.session.find::<E>(key).await? {
            Some(existing) => {
                E::apply_values(&mut existing.write(), &model);
                debug!(entity = %entity_name::<E>(), key, "merged detached values");
                Ok(UpdateResolution::Merged(existing))
            }
            None => self
                .session
                .attach_modified::<E>(model)
                .map(UpdateResolution::Registered),
        }
    }

    /// Signals that a tracked instance was mutated in place
    ///
    /// Nothing is registered; change detection at commit time picks up the
    /// mutation. Returns the state the instance is in now.
    pub fn update_tracked(&self, instance: &Tracked<E::Model>) -> RepositoryResult<EntityState> {
        self.session
            .state_of::<E>(instance)
            .ok_or_else(|| RepositoryError::NotTracked {
                entity: entity_name::<E>(),
            })
    }

    /// Schedules the entity with `id` for deletion
    ///
    /// Deleting a key that does not exist is a no-op.
    pub async fn delete(&self, id: EntityKey) -> RepositoryResult<()> {
        match self.session.find::<E>(id).await? {
            Some(existing) => self.session.remove::<E>(&existing),
            None => {
                debug!(entity = %entity_name::<E>(), key = id, "delete skipped, no such row");
                Ok(())
            }
        }
    }

    /// Starts tracking an entity that already exists in the store
    pub fn attach(&self, model: E::Model) -> RepositoryResult<Tracked<E::Model>> {
        key_column::<E>()?;
        self.session.attach::<E>(model)
    }

    /// Returns the tracked instance with `id`, loading and attaching it if
    /// the session does not track it yet
    ///
    /// Repeated calls with the same key return the same instance.
    pub async fn get_tracked_or_attach(
        &self,
        id: EntityKey,
        includes: &[&dyn Include<E>],
    ) -> RepositoryResult<Option<Tracked<E::Model>>> {
        key_column::<E>()?;
        if let Some(existing) = self.session.tracked::<E>(id) {
            return Ok(Some(existing));
        }

        match self.get_by_id(id, includes).await? {
            Some(model) => self.session.attach::<E>(model).map(Some),
            None => Ok(None),
        }
    }
}
