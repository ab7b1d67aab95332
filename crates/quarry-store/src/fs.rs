//! Filesystem object store

use crate::{validate_key, StoreError};
use quarry_domain::ObjectStore;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = ".quarry-tmp";

/// Object store backed by a directory tree
///
/// Key `a/b/c.json` lives at `{root}/a/b/c.json`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn temp_in(&self, path: &Path, data: &[u8]) -> Result<NamedTempFile, StoreError> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn collect(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect(&path, keys)?;
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            if let Ok(rel) = path.strip_prefix(&self.root) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    type Error = StoreError;

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        let tmp = self.temp_in(&path, data)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        tracing::trace!(key, bytes = data.len(), "Object written");
        Ok(())
    }

    fn put_new(&self, key: &str, data: &[u8]) -> Result<bool, Self::Error> {
        let path = self.path_for(key)?;
        if path.exists() {
            return Ok(false);
        }

        let tmp = self.temp_in(&path, data)?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, Self::Error> {
        Ok(self.path_for(key)?.is_file())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, Self::Error> {
        if prefix.starts_with('/') || prefix.split('/').any(|seg| seg == "..") {
            return Err(StoreError::InvalidKey(prefix.to_string()));
        }

        // Walk only the deepest directory the prefix pins down
        let dir = match prefix.rfind('/') {
            Some(pos) => self.root.join(&prefix[..pos]),
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        self.collect(&dir, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}
