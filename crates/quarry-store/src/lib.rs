//! Quarry Storage Layer
//!
//! Implements the `ObjectStore` and `PendingRegistry` traits.
//!
//! # Architecture
//!
//! - [`FsObjectStore`]: objects as files under a root directory, written via
//!   temp file + rename so readers never observe partial objects
//! - [`MemoryObjectStore`]: in-process map, for tests and dry runs
//! - [`SqlitePendingRegistry`]: SQLite table of projects with an outstanding job
//! - [`MemoryPendingRegistry`]: in-process registry
//!
//! # Examples
//!
//! ```no_run
//! use quarry_domain::ObjectStore;
//! use quarry_store::FsObjectStore;
//!
//! let store = FsObjectStore::new("/var/lib/quarry").unwrap();
//! store.put("CFA009660/manifests/submission_batch_1.json", b"{}").unwrap();
//! ```

#![warn(missing_docs)]

mod fs;
mod memory;
mod registry;

pub use fs::FsObjectStore;
pub use memory::{MemoryObjectStore, MemoryPendingRegistry};
pub use registry::SqlitePendingRegistry;

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Key escapes the store root or is malformed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// A lock was poisoned by a panicking writer
    #[error("Lock error: {0}")]
    Lock(String),

    /// Stored row could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Reject keys that are empty, absolute, or climb out of the root
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.starts_with('/') || key.ends_with('/') {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
