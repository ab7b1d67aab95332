//! Submission-to-materialization flows across sweeps

use quarry_batch::manifest::{aggregate_key, by_document_key, submission_key, summary_key};
use quarry_batch::{Aggregate, BatchPoller, BatchSubmitter, PollerConfig, SubmissionManifest};
use quarry_chunker::{ChunkerConfig, ChunkingEngine, WordTokenizer};
use quarry_domain::{
    CategoryCatalog, CompletionMarker, InferenceService, JobMetadata, JobStatus, ObjectStore, PendingEntry,
    PendingRegistry, RemoteJob, RequestOutcome, SourceDocument,
};
use quarry_extractor::{DecoderChain, RequestBuilder, RequestConfig, RequestPlanner};
use quarry_llm::{LlmError, MockInferenceService};
use quarry_store::{FsObjectStore, MemoryObjectStore, MemoryPendingRegistry};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ENDPOINT: &str = "/v1/chat/completions";

/// Store that fails or panics on writes to matching keys, or reads them slowly
struct FlakyStore {
    inner: MemoryObjectStore,
    fail_on: Mutex<Option<String>>,
    panic_on: Mutex<Option<String>>,
    slow_on: Mutex<Option<String>>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            fail_on: Mutex::new(None),
            panic_on: Mutex::new(None),
            slow_on: Mutex::new(None),
        }
    }

    fn slow_on(&self, pattern: Option<&str>) {
        *self.slow_on.lock().unwrap() = pattern.map(str::to_string);
    }

    fn fail_on(&self, pattern: Option<&str>) {
        *self.fail_on.lock().unwrap() = pattern.map(str::to_string);
    }

    fn panic_on(&self, pattern: Option<&str>) {
        *self.panic_on.lock().unwrap() = pattern.map(str::to_string);
    }

    fn check(&self, key: &str) -> Result<(), String> {
        let panic_pattern = self.panic_on.lock().unwrap().clone();
        if let Some(pattern) = panic_pattern {
            if key.contains(&pattern) {
                panic!("injected panic writing {}", key);
            }
        }
        let fail_pattern = self.fail_on.lock().unwrap().clone();
        if let Some(pattern) = fail_pattern {
            if key.contains(&pattern) {
                return Err(format!("injected failure writing {}", key));
            }
        }
        Ok(())
    }
}

impl ObjectStore for FlakyStore {
    type Error = String;

    fn put(&self, key: &str, data: &[u8]) -> Result<(), Self::Error> {
        self.check(key)?;
        self.inner.put(key, data).map_err(|e| e.to_string())
    }

    fn put_new(&self, key: &str, data: &[u8]) -> Result<bool, Self::Error> {
        self.check(key)?;
        self.inner.put_new(key, data).map_err(|e| e.to_string())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let slow_pattern = self.slow_on.lock().unwrap().clone();
        if slow_pattern.is_some_and(|pattern| key.contains(&pattern)) {
            std::thread::sleep(Duration::from_millis(200));
        }
        self.inner.get(key).map_err(|e| e.to_string())
    }

    fn exists(&self, key: &str) -> Result<bool, Self::Error> {
        self.inner.exists(key).map_err(|e| e.to_string())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, Self::Error> {
        self.inner.list(prefix).map_err(|e| e.to_string())
    }
}

/// Service whose listing reports every job completed, whatever `status` says
struct EagerListing(Arc<MockInferenceService>);

impl InferenceService for EagerListing {
    type Error = LlmError;

    fn submit(&self, jsonl: &str, metadata: &JobMetadata) -> Result<String, Self::Error> {
        self.0.submit(jsonl, metadata)
    }

    fn status(&self, job_id: &str) -> Result<JobStatus, Self::Error> {
        self.0.status(job_id)
    }

    fn list_jobs(&self, limit: usize) -> Result<Vec<RemoteJob>, Self::Error> {
        Ok(self
            .0
            .list_jobs(limit)?
            .into_iter()
            .map(|job| RemoteJob {
                status: JobStatus::Completed,
                ..job
            })
            .collect())
    }

    fn fetch_outputs(&self, job_id: &str) -> Result<Vec<RequestOutcome>, Self::Error> {
        self.0.fetch_outputs(job_id)
    }
}

struct BrokenRegistry;

impl PendingRegistry for BrokenRegistry {
    type Error = String;

    fn pending_projects(&self) -> Result<Vec<String>, Self::Error> {
        Err("registry offline".to_string())
    }

    fn mark_pending(&self, _project: &str, _job_id: &str) -> Result<(), Self::Error> {
        Err("registry offline".to_string())
    }

    fn clear_pending(&self, _project: &str, _job_id: &str) -> Result<(), Self::Error> {
        Err("registry offline".to_string())
    }

    fn entry(&self, _project: &str) -> Result<Option<PendingEntry>, Self::Error> {
        Err("registry offline".to_string())
    }
}

fn catalog() -> Arc<CategoryCatalog> {
    Arc::new(CategoryCatalog::default())
}

fn submit<S, R>(
    service: &Arc<MockInferenceService>,
    store: &Arc<S>,
    registry: &Arc<R>,
    project: &str,
    document: &str,
) -> SubmissionManifest
where
    S: ObjectStore,
    R: PendingRegistry,
{
    let builder = RequestBuilder::new(catalog(), RequestConfig::default()).unwrap();
    let requests = builder
        .build_for_document(&SourceDocument::new(project, document, "informe de auditoria"))
        .unwrap();
    BatchSubmitter::new(service.clone(), store.clone(), registry.clone(), ENDPOINT)
        .submit(project, &requests)
        .unwrap()
}

fn poller<S, R>(
    service: &Arc<MockInferenceService>,
    store: &Arc<S>,
    registry: &Arc<R>,
    config: PollerConfig,
) -> BatchPoller<MockInferenceService, S, R>
where
    S: ObjectStore,
    R: PendingRegistry,
{
    BatchPoller::new(
        service.clone(),
        store.clone(),
        registry.clone(),
        DecoderChain::standard(catalog()),
        config,
    )
    .unwrap()
}

fn aggregate<S: ObjectStore>(store: &S, project: &str, category: &str) -> Option<Aggregate> {
    let bytes = store.get(&aggregate_key(project, category)).ok()??;
    Some(serde_json::from_slice(&bytes).unwrap())
}

fn has_marker<S: ObjectStore>(store: &S, project: &str, job_id: &str) -> bool {
    store.exists(&CompletionMarker::key(project, job_id)).ok() == Some(true)
}

#[test]
fn test_large_document_end_to_end() {
    let service = Arc::new(
        MockInferenceService::new()
            .with_status_script(vec![JobStatus::Validating, JobStatus::InProgress, JobStatus::Completed])
            .with_default_completion("```json\n{\"finding\": \"sin observaciones\"}\n```"),
    );
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());

    let engine = ChunkingEngine::new(Arc::new(WordTokenizer), ChunkerConfig::default()).unwrap();
    let builder = RequestBuilder::new(catalog(), RequestConfig::default()).unwrap();
    let planner = RequestPlanner::new(engine, builder);

    let text = "palabra ".repeat(20_000);
    let plan = planner
        .plan("CFA009660", &[SourceDocument::new("CFA009660", "IXP-0001.txt", text)])
        .unwrap();
    assert_eq!(plan.requests.len(), 1);
    assert_eq!(plan.documents[0].chunks, 1);
    assert_eq!(plan.documents[0].total_tokens, 20_000);

    let manifest = BatchSubmitter::new(service.clone(), store.clone(), registry.clone(), ENDPOINT)
        .submit("CFA009660", &plan.requests)
        .unwrap();
    let poller = poller(&service, &store, &registry, PollerConfig::default());

    let first = poller.sweep();
    assert_eq!(first.deferred.len(), 1);
    assert_eq!(first.deferred[0].status, JobStatus::Validating);
    assert!(first.materialized.is_empty());

    let second = poller.sweep();
    assert_eq!(second.deferred[0].status, JobStatus::InProgress);

    let third = poller.sweep();
    assert_eq!(third.materialized.len(), 1);
    assert_eq!(third.materialized[0].records, 1);
    assert!(has_marker(store.as_ref(), "CFA009660", &manifest.job_id));

    let audit = aggregate(store.as_ref(), "CFA009660", "audit").unwrap();
    assert_eq!(audit.entries.len(), 1);
    assert_eq!(audit.entries[0].job_id, manifest.job_id);
    assert_eq!(audit.entries[0].record.stem, "IXP-0001");

    assert!(!registry.entry("CFA009660").unwrap().unwrap().pending);

    let fetched = service.calls().fetch_outputs;
    let fourth = poller.sweep();
    assert!(fourth.is_idle());
    assert_eq!(service.calls().fetch_outputs, fetched);
}

#[test]
fn test_marker_suppresses_rematerialization() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "ROP-1.txt");

    let poller = poller(&service, &store, &registry, PollerConfig::default());
    assert_eq!(poller.sweep().materialized.len(), 1);

    // Re-flag the project so the manifest is scanned again
    registry.mark_pending("P1", &manifest.job_id).unwrap();
    let report = poller.sweep();

    assert_eq!(report.manifests_scanned, 1);
    assert_eq!(report.already_materialized, 1);
    assert!(report.materialized.is_empty());
    assert_eq!(service.calls().fetch_outputs, 1);
}

#[test]
fn test_orphan_materialized_once() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    service.add_remote_job(
        "batch_lost",
        Some("P2"),
        JobStatus::Completed,
        vec![RequestOutcome {
            correlation_id: "P2_IXP-9_audit".to_string(),
            status_code: 200,
            content: Some(r#"[{"finding": "a"}, {"finding": "b"}]"#.to_string()),
        }],
    );
    service.add_remote_job("batch_anonymous", None, JobStatus::Completed, Vec::new());

    let poller = poller(&service, &store, &registry, PollerConfig::default());
    let first = poller.sweep();

    assert_eq!(first.manifests_scanned, 0);
    assert_eq!(first.orphans_found, 1);
    assert_eq!(first.orphans_materialized, 1);
    assert_eq!(first.materialized[0].records, 2);
    assert!(first.materialized[0].missing_ids.is_empty());
    assert!(has_marker(store.as_ref(), "P2", "batch_lost"));

    let second = poller.sweep();
    assert_eq!(second.orphans_found, 0);
    assert!(second.materialized.is_empty());
    assert_eq!(service.calls().fetch_outputs, 1);
}

#[test]
fn test_orphan_scan_disabled() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    service.add_remote_job("batch_lost", Some("P2"), JobStatus::Completed, Vec::new());

    let poller = poller(&service, &store, &registry, PollerConfig::lenient());
    let report = poller.sweep();

    assert!(report.is_idle());
    assert_eq!(service.calls().list_jobs, 0);
}

#[test]
fn test_registry_failure_falls_back_to_full_scan() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(BrokenRegistry);
    let manifest = submit(&service, &store, &registry, "P1", "IXP-3.txt");

    let poller = poller(&service, &store, &registry, PollerConfig::default());
    let report = poller.sweep();

    assert!(report.registry_fallback);
    assert_eq!(report.manifests_scanned, 1);
    assert_eq!(report.materialized.len(), 1);
    assert!(has_marker(store.as_ref(), "P1", &manifest.job_id));
}

#[test]
fn test_partial_failure_leaves_no_marker() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(FlakyStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "IXP-4.txt");
    let poller = poller(&service, &store, &registry, PollerConfig::default());

    store.fail_on(Some("/summary.json"));
    let failed = poller.sweep();

    assert!(failed.materialized.is_empty());
    assert_eq!(failed.errors.len(), 1);
    assert!(failed.errors[0].error.contains("injected failure"));
    assert!(!has_marker(store.as_ref(), "P1", &manifest.job_id));
    assert!(store.exists(&by_document_key("P1", &manifest.job_id)).unwrap());
    assert!(registry.entry("P1").unwrap().unwrap().pending);

    store.fail_on(None);
    let retried = poller.sweep();

    assert_eq!(retried.materialized.len(), 1);
    assert!(has_marker(store.as_ref(), "P1", &manifest.job_id));
    assert!(store.exists(&summary_key("P1", &manifest.job_id)).unwrap());
    assert_eq!(aggregate(store.as_ref(), "P1", "audit").unwrap().entries.len(), 1);
    assert_eq!(service.calls().fetch_outputs, 2);
}

#[test]
fn test_panic_is_contained_to_its_job() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(FlakyStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let broken = submit(&service, &store, &registry, "P1", "IXP-1.txt");
    let healthy = submit(&service, &store, &registry, "P2", "IXP-2.txt");
    let poller = poller(&service, &store, &registry, PollerConfig::default());

    store.panic_on(Some("P1/results/aggregate"));
    let report = poller.sweep();

    assert_eq!(report.materialized.len(), 1);
    assert_eq!(report.materialized[0].job_id, healthy.job_id);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].job_id, broken.job_id);
    assert!(report.errors[0].error.starts_with("panic:"));
    assert!(!has_marker(store.as_ref(), "P1", &broken.job_id));
    assert!(has_marker(store.as_ref(), "P2", &healthy.job_id));
}

#[test]
fn test_terminal_failure_is_reported_not_fetched() {
    let service = Arc::new(MockInferenceService::new().with_status_script(vec![JobStatus::Failed]));
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "DEC-1.txt");

    let poller = poller(&service, &store, &registry, PollerConfig::default());
    let report = poller.sweep();

    assert_eq!(report.terminal_failures.len(), 1);
    assert_eq!(report.terminal_failures[0].job_id, manifest.job_id);
    assert_eq!(service.calls().fetch_outputs, 0);
    assert!(!has_marker(store.as_ref(), "P1", &manifest.job_id));
}

#[test]
fn test_unreachable_service_retried_next_sweep() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "INI-1.txt");
    let poller = poller(&service, &store, &registry, PollerConfig::default());

    service.set_unavailable(true);
    let down = poller.sweep();
    assert_eq!(down.unreachable.len(), 1);
    assert!(down.materialized.is_empty());

    service.set_unavailable(false);
    let up = poller.sweep();
    assert_eq!(up.materialized.len(), 1);
    assert_eq!(up.materialized[0].job_id, manifest.job_id);
}

#[test]
fn test_concurrent_materialization() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifests: Vec<SubmissionManifest> = (1..=5)
        .map(|i| submit(&service, &store, &registry, &format!("P{}", i), "ROP-1.txt"))
        .collect();

    let poller = poller(&service, &store, &registry, PollerConfig::aggressive());
    let report = poller.sweep();

    assert_eq!(report.materialized.len(), 5);
    assert!(report.errors.is_empty());
    for manifest in &manifests {
        assert!(has_marker(store.as_ref(), &manifest.project, &manifest.job_id));
    }
    assert!(poller.sweep().is_idle());
}

#[test]
fn test_fresh_poller_over_filesystem_store() {
    let dir = tempfile::tempdir().unwrap();
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(FsObjectStore::new(dir.path()).unwrap());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "IFS-1.txt");

    let report = poller(&service, &store, &registry, PollerConfig::default()).sweep();
    assert_eq!(report.materialized.len(), 1);
    assert!(dir
        .path()
        .join(format!("P1/markers/{}.json", manifest.job_id))
        .exists());

    // A new process sees the same store and finds nothing to do
    let reopened = Arc::new(FsObjectStore::new(dir.path()).unwrap());
    registry.mark_pending("P1", &manifest.job_id).unwrap();
    let report = poller(&service, &reopened, &registry, PollerConfig::default()).sweep();

    assert_eq!(report.already_materialized, 1);
    assert!(report.materialized.is_empty());
    assert_eq!(service.calls().fetch_outputs, 1);
}

#[test]
fn test_same_project_jobs_keep_every_aggregate_entry() {
    let service = Arc::new(MockInferenceService::new());
    let store = Arc::new(FlakyStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    for (job_id, stem) in [("batch_a", "IXP-1"), ("batch_b", "IXP-2")] {
        service.add_remote_job(
            job_id,
            Some("P1"),
            JobStatus::Completed,
            vec![RequestOutcome {
                correlation_id: format!("P1_{}_audit", stem),
                status_code: 200,
                content: Some(r#"{"finding": "x"}"#.to_string()),
            }],
        );
    }

    store.slow_on(Some("/results/aggregate/"));
    let report = poller(&service, &store, &registry, PollerConfig::aggressive()).sweep();

    assert_eq!(report.materialized.len(), 2);
    assert!(report.errors.is_empty());
    let audit = aggregate(store.as_ref(), "P1", "audit").unwrap();
    let mut jobs: Vec<&str> = audit.entries.iter().map(|e| e.job_id.as_str()).collect();
    jobs.sort();
    assert_eq!(jobs, vec!["batch_a", "batch_b"]);
}

#[test]
fn test_known_status_wins_over_listing() {
    let mock = Arc::new(MockInferenceService::new().with_status_script(vec![JobStatus::InProgress]));
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&mock, &store, &registry, "P1", "ROP-1.txt");

    let poller = BatchPoller::new(
        Arc::new(EagerListing(mock.clone())),
        store.clone(),
        registry.clone(),
        DecoderChain::standard(catalog()),
        PollerConfig::default(),
    )
    .unwrap();
    let report = poller.sweep();

    assert_eq!(report.deferred.len(), 1);
    assert_eq!(report.deferred[0].job_id, manifest.job_id);
    assert_eq!(report.deferred[0].status, JobStatus::InProgress);
    assert_eq!(report.orphans_found, 0);
    assert!(report.materialized.is_empty());
    assert_eq!(mock.calls().list_jobs, 1);
    assert_eq!(mock.calls().fetch_outputs, 0);
}

fn stored_manifest<S: ObjectStore>(store: &S, manifest: &SubmissionManifest) -> SubmissionManifest {
    let bytes = store
        .get(&submission_key(&manifest.project, &manifest.job_id))
        .ok()
        .flatten()
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn test_status_regression_is_ignored() {
    let service = Arc::new(
        MockInferenceService::new().with_status_script(vec![JobStatus::InProgress, JobStatus::Validating]),
    );
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "IXP-5.txt");
    assert_eq!(manifest.status, JobStatus::Queued);
    let poller = poller(&service, &store, &registry, PollerConfig::default());

    let first = poller.sweep();
    assert_eq!(first.deferred[0].status, JobStatus::InProgress);
    assert_eq!(stored_manifest(store.as_ref(), &manifest).status, JobStatus::InProgress);

    let second = poller.sweep();
    assert_eq!(second.deferred[0].status, JobStatus::InProgress);
    assert_eq!(stored_manifest(store.as_ref(), &manifest).status, JobStatus::InProgress);
}

#[test]
fn test_terminal_status_is_never_left() {
    let service = Arc::new(MockInferenceService::new().with_status_script(vec![JobStatus::Expired, JobStatus::Completed]));
    let store = Arc::new(MemoryObjectStore::new());
    let registry = Arc::new(MemoryPendingRegistry::new());
    let manifest = submit(&service, &store, &registry, "P1", "IXP-6.txt");
    let poller = poller(&service, &store, &registry, PollerConfig::lenient());

    assert_eq!(poller.sweep().terminal_failures[0].status, JobStatus::Expired);

    let second = poller.sweep();
    assert_eq!(second.terminal_failures.len(), 1);
    assert_eq!(second.terminal_failures[0].status, JobStatus::Expired);
    assert!(second.materialized.is_empty());
    assert_eq!(service.calls().fetch_outputs, 0);
    assert!(!has_marker(store.as_ref(), "P1", &manifest.job_id));
    assert_eq!(stored_manifest(store.as_ref(), &manifest).status, JobStatus::Expired);
}
