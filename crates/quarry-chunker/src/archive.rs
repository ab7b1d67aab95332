//! Persisted chunks for inspection and re-runs

use crate::error::ChunkerError;
use quarry_domain::{document_stem, Chunk, ObjectStore};

/// Stores chunks under `{project}/chunks/{stem}_chunk_###.json`
pub struct ChunkArchive<'a, S: ObjectStore> {
    store: &'a S,
}

impl<'a, S: ObjectStore> ChunkArchive<'a, S> {
    /// Wrap an object store
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Store key of one chunk
    pub fn key(project: &str, document: &str, ordinal: usize) -> String {
        format!("{}/chunks/{}_chunk_{:03}.json", project, document_stem(document), ordinal)
    }

    /// Whether a document already has persisted chunks (keyed on chunk 000)
    pub fn is_chunked(&self, project: &str, document: &str) -> Result<bool, ChunkerError> {
        self.store
            .exists(&Self::key(project, document, 0))
            .map_err(|e| ChunkerError::Store(e.to_string()))
    }

    /// Persist chunks, returning the keys written
    pub fn save(&self, chunks: &[Chunk]) -> Result<Vec<String>, ChunkerError> {
        let mut keys = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let key = Self::key(&chunk.project, &chunk.document, chunk.ordinal);
            let body = serde_json::to_vec_pretty(chunk)?;
            self.store
                .put(&key, &body)
                .map_err(|e| ChunkerError::Store(e.to_string()))?;
            keys.push(key);
        }
        tracing::debug!(count = keys.len(), "Saved chunks");
        Ok(keys)
    }

    /// Load a document's persisted chunks in ordinal order
    pub fn load(&self, project: &str, document: &str) -> Result<Vec<Chunk>, ChunkerError> {
        let prefix = format!("{}/chunks/{}_chunk_", project, document_stem(document));
        let keys = self
            .store
            .list(&prefix)
            .map_err(|e| ChunkerError::Store(e.to_string()))?;

        let mut chunks = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bytes) = self.store.get(&key).map_err(|e| ChunkerError::Store(e.to_string()))? else {
                continue;
            };
            chunks.push(serde_json::from_slice::<Chunk>(&bytes)?);
        }
        chunks.sort_by_key(|c| c.ordinal);
        Ok(chunks)
    }
}
