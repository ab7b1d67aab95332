//! Batch submission
//!
//! One call submits every request of a project as a single job, then records
//! what was sent so later sweeps (in any process) can pick the job up.

use crate::error::BatchError;
use crate::manifest::{put_json, AuditManifest, ManifestEntry, SubmissionManifest};
use chrono::Utc;
use quarry_domain::{InferenceService, JobMetadata, JobStatus, ObjectStore, PendingRegistry};
use quarry_extractor::{to_jsonl, ExtractionRequest};
use std::sync::Arc;

/// Submits extraction requests as batch jobs
pub struct BatchSubmitter<I, S, R> {
    service: Arc<I>,
    store: Arc<S>,
    registry: Arc<R>,
    endpoint_path: String,
}

impl<I, S, R> BatchSubmitter<I, S, R>
where
    I: InferenceService,
    S: ObjectStore,
    R: PendingRegistry,
{
    /// Create a submitter; every batch line targets `endpoint_path`
    pub fn new(service: Arc<I>, store: Arc<S>, registry: Arc<R>, endpoint_path: impl Into<String>) -> Self {
        Self {
            service,
            store,
            registry,
            endpoint_path: endpoint_path.into(),
        }
    }

    /// Submit `requests` as one job for `project`
    ///
    /// Fails fast on an empty request list. Once the service accepted the
    /// job, the submission and audit manifests are written and the project is
    /// flagged pending (best effort).
    pub fn submit(&self, project: &str, requests: &[ExtractionRequest]) -> Result<SubmissionManifest, BatchError> {
        if requests.is_empty() {
            return Err(BatchError::NoEligibleRequests(project.to_string()));
        }

        let jsonl = to_jsonl(requests, &self.endpoint_path)?;
        let metadata = JobMetadata {
            project: project.to_string(),
        };

        let job_id = self
            .service
            .submit(&jsonl, &metadata)
            .map_err(|e| BatchError::Service(e.to_string()))?;

        tracing::info!(project, job_id = %job_id, requests = requests.len(), "Batch submitted");

        let manifest = SubmissionManifest {
            job_id: job_id.clone(),
            project: project.to_string(),
            submitted_at: Utc::now(),
            status: JobStatus::Queued,
            requests: requests
                .iter()
                .map(|r| ManifestEntry {
                    correlation_id: r.id(),
                    category: r.category.clone(),
                    source_document: r.source_document.clone(),
                })
                .collect(),
        };
        put_json(self.store.as_ref(), &manifest.key(), &manifest)?;

        let audit = AuditManifest {
            job_id: job_id.clone(),
            project: project.to_string(),
            entries: requests.iter().map(ExtractionRequest::audit_entry).collect(),
        };
        put_json(self.store.as_ref(), &audit.key(), &audit)?;

        if let Err(e) = self.registry.mark_pending(project, &job_id) {
            tracing::warn!(project, job_id = %job_id, error = %e, "Failed to mark project pending");
        }

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{audit_key, get_json, submission_key};
    use quarry_domain::{CategoryCatalog, PendingEntry, SourceDocument};
    use quarry_extractor::{RequestBuilder, RequestConfig};
    use quarry_llm::MockInferenceService;
    use quarry_store::{MemoryObjectStore, MemoryPendingRegistry};

    struct BrokenRegistry;

    impl PendingRegistry for BrokenRegistry {
        type Error = String;

        fn pending_projects(&self) -> Result<Vec<String>, Self::Error> {
            Err("registry down".to_string())
        }

        fn mark_pending(&self, _project: &str, _job_id: &str) -> Result<(), Self::Error> {
            Err("registry down".to_string())
        }

        fn clear_pending(&self, _project: &str, _job_id: &str) -> Result<(), Self::Error> {
            Err("registry down".to_string())
        }

        fn entry(&self, _project: &str) -> Result<Option<PendingEntry>, Self::Error> {
            Err("registry down".to_string())
        }
    }

    fn requests() -> Vec<ExtractionRequest> {
        let builder = RequestBuilder::new(Arc::new(CategoryCatalog::default()), RequestConfig::default()).unwrap();
        builder
            .build_for_document(&SourceDocument::new("P1", "ROP-1.txt", "texto"))
            .unwrap()
    }

    #[test]
    fn test_empty_submission_fails_fast() {
        let service = Arc::new(MockInferenceService::new());
        let submitter = BatchSubmitter::new(
            service.clone(),
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryPendingRegistry::new()),
            "/v1/chat/completions",
        );
        assert!(matches!(submitter.submit("P1", &[]), Err(BatchError::NoEligibleRequests(_))));
        assert_eq!(service.calls().submit, 0);
    }

    #[test]
    fn test_submission_records_manifests_and_registry() {
        let service = Arc::new(MockInferenceService::new());
        let store = Arc::new(MemoryObjectStore::new());
        let registry = Arc::new(MemoryPendingRegistry::new());
        let submitter = BatchSubmitter::new(service.clone(), store.clone(), registry.clone(), "/v1/chat/completions");

        let manifest = submitter.submit("P1", &requests()).unwrap();
        assert_eq!(manifest.requests.len(), 2);
        assert_eq!(manifest.requests[0].correlation_id, "P1_ROP-1_products");

        let jsonl = service.submitted_jsonl(&manifest.job_id).unwrap();
        assert_eq!(jsonl.lines().count(), 2);
        assert!(jsonl.contains("\"url\":\"/v1/chat/completions\""));

        let stored: SubmissionManifest = get_json(store.as_ref(), &submission_key("P1", &manifest.job_id))
            .unwrap()
            .unwrap();
        assert_eq!(stored, manifest);

        let audit: AuditManifest = get_json(store.as_ref(), &audit_key("P1", &manifest.job_id))
            .unwrap()
            .unwrap();
        assert_eq!(audit.entries.len(), 2);
        assert!(audit.entries[0].user_message.contains("texto"));

        let entry = registry.entry("P1").unwrap().unwrap();
        assert!(entry.pending);
        assert_eq!(entry.last_job_id.as_deref(), Some(manifest.job_id.as_str()));
    }

    #[test]
    fn test_registry_failure_does_not_fail_submission() {
        let store = Arc::new(MemoryObjectStore::new());
        let submitter = BatchSubmitter::new(
            Arc::new(MockInferenceService::new()),
            store.clone(),
            Arc::new(BrokenRegistry),
            "/v1/chat/completions",
        );

        let manifest = submitter.submit("P1", &requests()).unwrap();
        assert!(store.exists(&manifest.key()).unwrap());
    }

    #[test]
    fn test_service_failure_writes_nothing() {
        let service = Arc::new(MockInferenceService::new());
        service.set_unavailable(true);
        let store = Arc::new(MemoryObjectStore::new());
        let submitter = BatchSubmitter::new(
            service,
            store.clone(),
            Arc::new(MemoryPendingRegistry::new()),
            "/v1/chat/completions",
        );

        assert!(matches!(submitter.submit("P1", &requests()), Err(BatchError::Service(_))));
        assert!(store.is_empty());
    }
}
