//! In-process store and registry

use crate::{validate_key, StoreError};
use chrono::Utc;
use quarry_domain::{ObjectStore, PendingEntry, PendingRegistry};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|e| StoreError::Lock(e.to_string()))
}

/// Object store held in memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove an object (lets tests simulate lost manifests)
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.objects)?.remove(key).is_some())
    }
}

impl ObjectStore for MemoryObjectStore {
    type Error = StoreError;

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Self::Error> {
        validate_key(key)?;
        lock(&self.objects)?.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn put_new(&self, key: &str, data: &[u8]) -> Result<bool, Self::Error> {
        validate_key(key)?;
        let mut objects = lock(&self.objects)?;
        if objects.contains_key(key) {
            return Ok(false);
        }
        objects.insert(key.to_string(), data.to_vec());
        Ok(true)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(lock(&self.objects)?.get(key).cloned())
    }

    fn exists(&self, key: &str) -> Result<bool, Self::Error> {
        Ok(lock(&self.objects)?.contains_key(key))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, Self::Error> {
        Ok(lock(&self.objects)?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Pending registry held in memory
#[derive(Debug, Default)]
pub struct MemoryPendingRegistry {
    entries: Mutex<BTreeMap<String, PendingEntry>>,
}

impl MemoryPendingRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingRegistry for MemoryPendingRegistry {
    type Error = StoreError;

    fn pending_projects(&self) -> Result<Vec<String>, Self::Error> {
        Ok(lock(&self.entries)?
            .values()
            .filter(|e| e.pending)
            .map(|e| e.project.clone())
            .collect())
    }

    fn mark_pending(&self, project: &str, job_id: &str) -> Result<(), Self::Error> {
        lock(&self.entries)?.insert(
            project.to_string(),
            PendingEntry {
                project: project.to_string(),
                pending: true,
                last_job_id: Some(job_id.to_string()),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn clear_pending(&self, project: &str, job_id: &str) -> Result<(), Self::Error> {
        let mut entries = lock(&self.entries)?;
        if let Some(entry) = entries.get_mut(project) {
            if entry.last_job_id.as_deref().map_or(true, |last| last == job_id) {
                entry.pending = false;
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    fn entry(&self, project: &str) -> Result<Option<PendingEntry>, Self::Error> {
        Ok(lock(&self.entries)?.get(project).cloned())
    }
}
