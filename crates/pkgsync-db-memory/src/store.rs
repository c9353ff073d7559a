use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use pkgsync_storage::{Criteria, Entity, EntityKind, ObjectStore, StorageError};
use serde_json::{Map, Value};

pub type StoreKey = (EntityKind, u64);

/// In-memory object store using papaya lock-free HashMap.
///
/// Ids are allocated from a single counter shared by all kinds, starting at 1.
/// Every effective write (insert, changed save, removal) bumps a mutation
/// counter; saving an entity whose fields did not change does not.
#[derive(Debug)]
pub struct InMemoryStore {
    pub(crate) data: Arc<PapayaHashMap<StoreKey, Entity>>,
    id_counter: AtomicU64,
    mutations: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            id_counter: AtomicU64::new(1),
            mutations: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }

    fn record_mutation(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of effective writes since the store was created.
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Inserts an entity of `kind` with the given fields and returns it with its id.
    ///
    /// Used to seed fixtures; counts as a mutation.
    pub fn insert(&self, kind: EntityKind, fields: Map<String, Value>) -> Entity {
        let entity = Entity {
            kind,
            id: Some(self.next_id()),
            fields,
        };
        self.data
            .pin()
            .insert((kind, entity.id_or_zero()), entity.clone());
        self.record_mutation();
        entity
    }

    /// Returns the entity stored under `kind`/`id`.
    pub fn fetch(&self, kind: EntityKind, id: u64) -> Option<Entity> {
        self.data.pin().get(&(kind, id)).cloned()
    }

    /// Returns every stored entity of `kind`, ordered by id.
    pub fn all(&self, kind: EntityKind) -> Vec<Entity> {
        self.collect(kind, &Criteria::new())
    }

    /// Number of stored entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> usize {
        let guard = self.data.pin();
        guard.iter().filter(|((k, _), _)| *k == kind).count()
    }

    fn collect(&self, kind: EntityKind, criteria: &Criteria) -> Vec<Entity> {
        let guard = self.data.pin();
        let mut found: Vec<Entity> = guard
            .iter()
            .filter(|((k, _), entity)| *k == kind && criteria.matches(entity))
            .map(|(_, entity)| entity.clone())
            .collect();
        found.sort_by_key(Entity::id_or_zero);
        found
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(
        &self,
        kind: EntityKind,
        criteria: &Criteria,
    ) -> Result<Option<Entity>, StorageError> {
        Ok(self.collect(kind, criteria).into_iter().next())
    }

    async fn find_all(
        &self,
        kind: EntityKind,
        criteria: &Criteria,
    ) -> Result<Vec<Entity>, StorageError> {
        Ok(self.collect(kind, criteria))
    }

    async fn save(&self, entity: &mut Entity) -> Result<(), StorageError> {
        let guard = self.data.pin();
        match entity.id {
            None => {
                let id = self.next_id();
                entity.id = Some(id);
                guard.insert((entity.kind, id), entity.clone());
                self.record_mutation();
            }
            Some(id) => {
                let key = (entity.kind, id);
                match guard.get(&key) {
                    None => return Err(StorageError::not_found(entity.kind, id)),
                    Some(existing) if existing == entity => {}
                    Some(_) => {
                        guard.insert(key, entity.clone());
                        self.record_mutation();
                    }
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, entity: &Entity) -> Result<(), StorageError> {
        let id = entity
            .id
            .ok_or_else(|| StorageError::invalid_entity("cannot remove an unsaved entity"))?;
        let guard = self.data.pin();
        if guard.remove(&(entity.kind, id)).is_none() {
            return Err(StorageError::not_found(entity.kind, id));
        }
        self.record_mutation();
        Ok(())
    }

    async fn update_where(
        &self,
        kind: EntityKind,
        criteria: &Criteria,
        changes: &Map<String, Value>,
    ) -> Result<usize, StorageError> {
        let matching = self.collect(kind, criteria);
        let touched = matching.len();
        for mut entity in matching {
            for (field, value) in changes {
                entity.set(field.clone(), value.clone());
            }
            self.save(&mut entity).await?;
        }
        Ok(touched)
    }

    async fn remove_where(
        &self,
        kind: EntityKind,
        criteria: &Criteria,
    ) -> Result<usize, StorageError> {
        let matching = self.collect(kind, criteria);
        for entity in &matching {
            self.remove(entity).await?;
        }
        Ok(matching.len())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}
