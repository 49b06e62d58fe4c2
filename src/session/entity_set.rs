//! Identity map and change tracking state for one entity type.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};

use sea_orm::{Iterable, ModelTrait};

use super::changes::{ChangeSet, PendingChanges};
use super::tracked::{EntityState, Tracked};
use crate::entity::{EntityDescriptor, EntityKey, UNASSIGNED_KEY, entity_name};
use crate::error::{RepositoryError, RepositoryResult};

/// Bookkeeping for a single tracked instance.
pub(crate) struct Entry<M> {
    pub(crate) instance: Tracked<M>,
    pub(crate) state: EntityState,
    /// Values last confirmed by the store. `None` until the store has seen
    /// the instance (added, or registered as modified without a read).
    pub(crate) original: Option<M>,
    /// Key the instance is indexed under; `None` while the store has not
    /// generated one yet.
    pub(crate) key: Option<EntityKey>,
}

impl<M: ModelTrait + Clone> Entry<M> {
    /// State after comparing the instance against its original values.
    pub(crate) fn current_state(&self) -> EntityState {
        match (self.state, &self.original) {
            (EntityState::Unchanged, Some(original)) if self.differs_from(original) => {
                EntityState::Modified
            }
            (state, _) => state,
        }
    }

    fn differs_from(&self, original: &M) -> bool {
        let current = self.instance.read();
        <M::Entity as sea_orm::EntityTrait>::Column::iter()
            .any(|column| original.get(column) != current.get(column))
    }
}

/// Tracked instances of one entity type, in registration order.
pub(crate) struct EntitySet<E: EntityDescriptor> {
    next_entry: u64,
    entries: BTreeMap<u64, Entry<E::Model>>,
    by_key: HashMap<EntityKey, u64>,
}

impl<E: EntityDescriptor> EntitySet<E> {
    pub(crate) fn new() -> Self {
        Self {
            next_entry: 0,
            entries: BTreeMap::new(),
            by_key: HashMap::new(),
        }
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (u64, &Entry<E::Model>)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub(crate) fn by_key(&self, key: EntityKey) -> Option<&Entry<E::Model>> {
        self.by_key.get(&key).and_then(|id| self.entries.get(id))
    }

    /// Finds the entry holding `instance`, comparing by identity.
    pub(crate) fn position_of(&self, instance: &Tracked<E::Model>) -> Option<u64> {
        let key = E::key(&instance.read());
        if let Some(id) = self.by_key.get(&key) {
            if self
                .entries
                .get(id)
                .is_some_and(|entry| entry.instance.same_instance(instance))
            {
                return Some(*id);
            }
        }

        self.entries
            .iter()
            .find(|(_, entry)| entry.instance.same_instance(instance))
            .map(|(id, _)| *id)
    }

    pub(crate) fn entry(&self, id: u64) -> Option<&Entry<E::Model>> {
        self.entries.get(&id)
    }

    pub(crate) fn entry_mut(&mut self, id: u64) -> Option<&mut Entry<E::Model>> {
        self.entries.get_mut(&id)
    }

    /// Registers a new instance under its key.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::AlreadyTracked`] when another instance is
    /// already registered under the same key.
    pub(crate) fn register(
        &mut self,
        model: E::Model,
        state: EntityState,
        original: Option<E::Model>,
    ) -> RepositoryResult<Tracked<E::Model>> {
        let key = E::key(&model);
        let indexed = (key != UNASSIGNED_KEY).then_some(key);
        if let Some(key) = indexed {
            if self.by_key.contains_key(&key) {
                return Err(RepositoryError::AlreadyTracked {
                    entity: entity_name::<E>(),
                    key,
                });
            }
        }

        let id = self.next_entry;
        self.next_entry += 1;

        let instance = Tracked::new(model);
        if let Some(key) = indexed {
            self.by_key.insert(key, id);
        }
        self.entries.insert(
            id,
            Entry {
                instance: instance.clone(),
                state,
                original,
                key: indexed,
            },
        );

        Ok(instance)
    }

    /// Stops tracking an entry.
    pub(crate) fn remove(&mut self, id: u64) -> Option<Entry<E::Model>> {
        let entry = self.entries.remove(&id)?;
        if let Some(key) = entry.key {
            if self.by_key.get(&key) == Some(&id) {
                self.by_key.remove(&key);
            }
        }
        Some(entry)
    }

    /// Records a committed insert: copies the stored row onto the instance
    /// and indexes it under the key the store assigned.
    pub(crate) fn accept_insert(&mut self, id: u64, stored: E::Model) {
        let key = E::key(&stored);
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        E::apply_values(&mut entry.instance.write(), &stored);
        entry.state = EntityState::Unchanged;
        entry.original = Some(entry.instance.snapshot());
        entry.key = Some(key);
        self.by_key.insert(key, id);
    }

    /// Records a committed update; `written` becomes the new original.
    pub(crate) fn accept_update(&mut self, id: u64, written: E::Model) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.state = EntityState::Unchanged;
            entry.original = Some(written);
        }
    }

    pub(crate) fn accept_delete(&mut self, id: u64) {
        self.remove(id);
    }
}

/// Type-erased view of an [`EntitySet`] so sets of different entity types
/// can live in one tracker.
pub(crate) trait TrackedSet: Send {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn len(&self) -> usize;

    fn has_changes(&self) -> bool;

    /// Collects the writes a commit must perform for this set.
    fn prepare(&self) -> RepositoryResult<Option<Box<dyn PendingChanges>>>;
}

impl<E: EntityDescriptor> TrackedSet for EntitySet<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn has_changes(&self) -> bool {
        self.entries
            .values()
            .any(|entry| entry.current_state() != EntityState::Unchanged)
    }

    fn prepare(&self) -> RepositoryResult<Option<Box<dyn PendingChanges>>> {
        if !self.has_changes() {
            return Ok(None);
        }

        let changes = ChangeSet::<E>::collect(self)?;
        Ok(Some(Box::new(changes)))
    }
}

/// All entity sets of a session, ordered by the first time each entity type
/// was touched.
#[derive(Default)]
pub(crate) struct ChangeTracker {
    sets: Vec<Box<dyn TrackedSet>>,
    index: HashMap<TypeId, usize>,
}

impl ChangeTracker {
    pub(crate) fn set<E: EntityDescriptor>(&self) -> Option<&EntitySet<E>> {
        let position = self.index.get(&TypeId::of::<E>())?;
        self.sets.get(*position)?.as_any().downcast_ref()
    }

    pub(crate) fn set_mut<E: EntityDescriptor>(&mut self) -> &mut EntitySet<E> {
        let sets = &mut self.sets;
        let position = *self.index.entry(TypeId::of::<E>()).or_insert_with(|| {
            sets.push(Box::new(EntitySet::<E>::new()));
            sets.len() - 1
        });

        match sets[position].as_any_mut().downcast_mut::<EntitySet<E>>() {
            Some(set) => set,
            None => unreachable!("entity set indexed under a foreign type id"),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sets.iter().map(|set| set.len()).sum()
    }

    pub(crate) fn has_changes(&self) -> bool {
        self.sets.iter().any(|set| set.has_changes())
    }

    /// Pending writes of every entity type with changes, in first-touch order.
    pub(crate) fn prepare(&self) -> RepositoryResult<Vec<Box<dyn PendingChanges>>> {
        let mut pending = Vec::new();
        for set in &self.sets {
            if let Some(changes) = set.prepare()? {
                pending.push(changes);
            }
        }
        Ok(pending)
    }
}
