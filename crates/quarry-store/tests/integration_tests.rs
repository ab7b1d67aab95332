//! Integration tests for quarry-store
//!
//! These tests exercise the filesystem store and the SQLite registry against
//! real temporary directories and databases.

use quarry_domain::{ObjectStore, PendingRegistry};
use quarry_store::{FsObjectStore, SqlitePendingRegistry, StoreError};
use tempfile::TempDir;

#[test]
fn test_fs_put_get_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path()).unwrap();

    store.put("P/results/job1/summary.json", b"one").unwrap();
    store.put("P/results/job1/summary.json", b"two").unwrap();

    let data = store.get("P/results/job1/summary.json").unwrap();
    assert_eq!(data.as_deref(), Some(&b"two"[..]));
    assert!(store.get("P/missing.json").unwrap().is_none());
}

#[test]
fn test_fs_put_new_never_overwrites() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path()).unwrap();

    assert!(store.put_new("P/markers/job1.json", b"first").unwrap());
    assert!(!store.put_new("P/markers/job1.json", b"second").unwrap());

    let data = store.get("P/markers/job1.json").unwrap().unwrap();
    assert_eq!(data, b"first");
}

#[test]
fn test_fs_list_filters_prefix_and_skips_temp_files() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path()).unwrap();

    store.put("P/manifests/submission_b.json", b"{}").unwrap();
    store.put("P/manifests/submission_a.json", b"{}").unwrap();
    store.put("P/manifests/audit_a.json", b"{}").unwrap();
    store.put("Q/manifests/submission_c.json", b"{}").unwrap();
    std::fs::write(dir.path().join("P/manifests/.quarry-tmpXYZ"), b"partial").unwrap();

    let keys = store.list("P/manifests/submission_").unwrap();
    assert_eq!(
        keys,
        vec!["P/manifests/submission_a.json", "P/manifests/submission_b.json"]
    );

    let all = store.list("").unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn test_fs_list_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path()).unwrap();
    assert!(store.list("nobody/manifests/").unwrap().is_empty());
}

#[test]
fn test_fs_rejects_escaping_keys() {
    let dir = TempDir::new().unwrap();
    let store = FsObjectStore::new(dir.path()).unwrap();
    assert!(matches!(store.put("../x.json", b""), Err(StoreError::InvalidKey(_))));
    assert!(matches!(store.list("../"), Err(StoreError::InvalidKey(_))));
}

#[test]
fn test_registry_initialization() {
    let registry = SqlitePendingRegistry::new(":memory:");
    assert!(registry.is_ok(), "Registry should initialize successfully");
}

#[test]
fn test_registry_mark_clear_cycle() {
    let registry = SqlitePendingRegistry::new(":memory:").unwrap();

    registry.mark_pending("P1", "batch_1").unwrap();
    registry.mark_pending("P2", "batch_2").unwrap();
    assert_eq!(registry.pending_projects().unwrap(), vec!["P1", "P2"]);

    registry.clear_pending("P1", "batch_1").unwrap();
    assert_eq!(registry.pending_projects().unwrap(), vec!["P2"]);

    let entry = registry.entry("P1").unwrap().unwrap();
    assert!(!entry.pending);
    assert_eq!(entry.last_job_id.as_deref(), Some("batch_1"));
}

#[test]
fn test_registry_clear_ignores_stale_job() {
    let registry = SqlitePendingRegistry::new(":memory:").unwrap();
    registry.mark_pending("P1", "batch_1").unwrap();
    registry.mark_pending("P1", "batch_2").unwrap();

    registry.clear_pending("P1", "batch_1").unwrap();

    let entry = registry.entry("P1").unwrap().unwrap();
    assert!(entry.pending);
    assert_eq!(entry.last_job_id.as_deref(), Some("batch_2"));
}

#[test]
fn test_registry_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.db");

    {
        let registry = SqlitePendingRegistry::new(&path).unwrap();
        registry.mark_pending("P1", "batch_9").unwrap();
    }

    let registry = SqlitePendingRegistry::new(&path).unwrap();
    assert_eq!(registry.pending_projects().unwrap(), vec!["P1"]);
    assert!(registry.entry("unknown").unwrap().is_none());
}
