//! In-memory persistence for tests/dev.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

use serde_json::Value;

use inkwell_core::{Character, CharacterId, Document, DocumentId, Entity, Project, ProjectId};

use crate::dispatcher::Persistence;
use crate::error::PersistError;

/// Keeps the latest persisted version of every entity and settings key.
///
/// - No IO
/// - Never fails
/// - Counts every persistence call in `writes()`
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    documents: RwLock<HashMap<DocumentId, Document>>,
    characters: RwLock<HashMap<CharacterId, Character>>,
    projects: RwLock<HashMap<ProjectId, Project>>,
    settings: RwLock<BTreeMap<String, Value>>,
    writes: AtomicU64,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, id: &DocumentId) -> Option<Document> {
        read(&self.documents).get(id).cloned()
    }

    pub fn character(&self, id: &CharacterId) -> Option<Character> {
        read(&self.characters).get(id).cloned()
    }

    pub fn project(&self, id: &ProjectId) -> Option<Project> {
        read(&self.projects).get(id).cloned()
    }

    pub fn setting(&self, key: &str) -> Option<Value> {
        read(&self.settings).get(key).cloned()
    }

    pub fn settings(&self) -> BTreeMap<String, Value> {
        read(&self.settings).clone()
    }

    /// Number of successful persistence calls so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn store<E>(&self, map: &RwLock<HashMap<E::Id, E>>, entity: &E)
    where
        E: Entity + Clone,
    {
        write(map).insert(*entity.id(), entity.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl Persistence for InMemoryPersistence {
    async fn save_document(&self, document: &Document) -> Result<(), PersistError> {
        self.store(&self.documents, document);
        Ok(())
    }

    async fn save_character(&self, character: &Character) -> Result<(), PersistError> {
        self.store(&self.characters, character);
        Ok(())
    }

    async fn save_project(&self, project: &Project) -> Result<(), PersistError> {
        self.store(&self.projects, project);
        Ok(())
    }

    async fn save_setting(&self, key: &str, value: &Value) -> Result<(), PersistError> {
        write(&self.settings).insert(key.to_string(), value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
