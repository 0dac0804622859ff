//! Persistence collaborator.
//!
//! The core never holds live references between entities. Everything is
//! loaded, listed, saved and deleted through a [`Store`], and every cascade
//! runs inside [`Store::with_transaction`] so a failure halfway through leaves
//! nothing behind.

use crate::config::{BackendKind, CorrConfig};
use crate::core::types::*;
use crate::error::{CorrError, CorrResult};
use crate::persistence::load_from_disk;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub type Table<E> = BTreeMap<EntityId, E>;

/// Every entity table plus the id counter. This is also the snapshot format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub(crate) next_id: EntityId,
    pub(crate) collections: Table<WordCollection>,
    pub(crate) varieties: Table<Variety>,
    pub(crate) entries: Table<Entry>,
    pub(crate) data: Table<Datum>,
    pub(crate) views: Table<View>,
    pub(crate) alignments: Table<Alignment>,
    pub(crate) groups: Table<Group>,
    pub(crate) zones: Table<Zone>,
    pub(crate) protosegments: Table<Protosegment>,
    pub(crate) clusters: Table<Cluster>,
    pub(crate) sets: Table<CorrespondenceSet>,
    pub(crate) citations: Table<Citation>,
}

pub trait Store {
    fn load<E: Entity>(&self, id: EntityId) -> CorrResult<E>;

    /// Children of `parent` along `relation`, by ordinal then id.
    fn list_related<E: Entity>(&self, relation: Relation, parent: EntityId) -> CorrResult<Vec<E>>;

    fn list_all<E: Entity>(&self) -> CorrResult<Vec<E>>;

    /// Inserts or replaces `entity`, assigning an id if it has none.
    fn save<E: Entity>(&mut self, entity: &mut E) -> CorrResult<EntityId>;

    fn delete<E: Entity>(&mut self, id: EntityId) -> CorrResult<()>;

    /// Runs `f` as one unit: on error nothing it did remains visible.
    fn with_transaction<T, F>(&mut self, f: F) -> CorrResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> CorrResult<T>;

    fn count_related<E: Entity>(&self, relation: Relation, parent: EntityId) -> CorrResult<usize> {
        Ok(self.list_related::<E>(relation, parent)?.len())
    }
}

/// Arena store backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    depth: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Tables) -> Self {
        Self { tables, depth: 0 }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn snapshot(&self) -> Tables {
        self.tables.clone()
    }

    pub fn restore(&mut self, tables: Tables) {
        self.tables = tables;
    }
}

impl Store for MemoryStore {
    fn load<E: Entity>(&self, id: EntityId) -> CorrResult<E> {
        E::table(&self.tables)
            .get(&id)
            .cloned()
            .ok_or_else(|| CorrError::not_found(E::KIND, id))
    }

    fn list_related<E: Entity>(&self, relation: Relation, parent: EntityId) -> CorrResult<Vec<E>> {
        let mut rows: Vec<E> = E::table(&self.tables)
            .values()
            .filter(|e| e.parent(relation) == Some(parent))
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.ordinal(), e.id()));
        Ok(rows)
    }

    fn list_all<E: Entity>(&self) -> CorrResult<Vec<E>> {
        let mut rows: Vec<E> = E::table(&self.tables).values().cloned().collect();
        rows.sort_by_key(|e| (e.ordinal(), e.id()));
        Ok(rows)
    }

    fn save<E: Entity>(&mut self, entity: &mut E) -> CorrResult<EntityId> {
        let id = match entity.id() {
            Some(id) => id,
            None => {
                self.tables.next_id += 1;
                let id = self.tables.next_id;
                entity.set_id(id);
                id
            }
        };
        E::table_mut(&mut self.tables).insert(id, entity.clone());
        Ok(id)
    }

    fn delete<E: Entity>(&mut self, id: EntityId) -> CorrResult<()> {
        E::table_mut(&mut self.tables)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CorrError::not_found(E::KIND, id))
    }

    fn with_transaction<T, F>(&mut self, f: F) -> CorrResult<T>
    where
        F: FnOnce(&mut Self) -> CorrResult<T>,
    {
        // Nested calls join the outermost transaction.
        if self.depth > 0 {
            return f(self);
        }
        let snapshot = self.tables.clone();
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        if let Err(e) = &result {
            debug!(error = %e, "rolling back transaction");
            self.tables = snapshot;
        }
        result
    }
}

/// Resolves the configured backend. Replaces runtime backend lookup with a
/// closed set of variants.
pub fn open_store(config: &CorrConfig) -> CorrResult<MemoryStore> {
    match &config.backend {
        BackendKind::InMemory => Ok(MemoryStore::new()),
        BackendKind::Snapshot { path } => {
            if path.exists() {
                info!(path = %path.display(), "loading snapshot");
                Ok(MemoryStore::from_tables(load_from_disk(path)?))
            } else {
                info!(path = %path.display(), "no snapshot yet, starting empty");
                Ok(MemoryStore::new())
            }
        }
    }
}

struct TrackedState<T> {
    current: T,
    saved: Option<T>,
    dirty: bool,
}

/// In-memory copy of one entity with a dirty flag.
///
/// `update`, `save`, `delete` and `revert` take the same lock, so two callers
/// sharing an instance never interleave their changes to the flag.
pub struct Tracked<T: Entity> {
    state: Mutex<TrackedState<T>>,
}

impl<T: Entity> Tracked<T> {
    /// A value that has never been persisted.
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(TrackedState {
                current: value,
                saved: None,
                dirty: true,
            }),
        }
    }

    pub fn load<S: Store>(store: &S, id: EntityId) -> CorrResult<Self> {
        let value: T = store.load(id)?;
        Ok(Self {
            state: Mutex::new(TrackedState {
                saved: Some(value.clone()),
                current: value,
                dirty: false,
            }),
        })
    }

    pub fn get(&self) -> T {
        self.state.lock().current.clone()
    }

    pub fn id(&self) -> Option<EntityId> {
        self.state.lock().current.id()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut state = self.state.lock();
        state.dirty = true;
        f(&mut state.current)
    }

    pub fn save<S: Store>(&self, store: &mut S) -> CorrResult<EntityId> {
        let mut state = self.state.lock();
        if let (false, Some(id)) = (state.dirty, state.current.id()) {
            return Ok(id);
        }
        let id = store.save(&mut state.current)?;
        state.saved = Some(state.current.clone());
        state.dirty = false;
        Ok(id)
    }

    /// Records `value` as persisted, for callers that wrote it themselves as
    /// part of a larger transaction. Call only once that transaction commits.
    pub fn mark_saved(&self, value: T) {
        let mut state = self.state.lock();
        state.saved = Some(value.clone());
        state.current = value;
        state.dirty = false;
    }

    pub fn delete<S: Store>(&self, store: &mut S) -> CorrResult<()> {
        let mut state = self.state.lock();
        if let Some(id) = state.current.id() {
            store.delete::<T>(id)?;
        }
        state.saved = None;
        state.dirty = true;
        Ok(())
    }

    /// Drops unsaved changes. Returns false when there was nothing to restore.
    pub fn revert(&self) -> bool {
        let mut state = self.state.lock();
        match state.saved.clone() {
            Some(saved) if state.dirty => {
                state.current = saved;
                state.dirty = false;
                true
            }
            _ => false,
        }
    }
}
