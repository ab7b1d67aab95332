//! Persisted job artifacts and their store layout
//!
//! Every key is derived from the project and job id alone, so any sweep can
//! find (and overwrite) what an earlier sweep wrote.

use crate::error::BatchError;
use chrono::{DateTime, Utc};
use quarry_domain::{BatchJob, JobStatus, ObjectStore};
use quarry_extractor::AuditEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const SUBMISSION_PREFIX: &str = "submission_";

/// Store key of a job's submission manifest
pub fn submission_key(project: &str, job_id: &str) -> String {
    format!("{}/manifests/{}{}.json", project, SUBMISSION_PREFIX, job_id)
}

/// Store key of a job's audit manifest
pub fn audit_key(project: &str, job_id: &str) -> String {
    format!("{}/manifests/audit_{}.json", project, job_id)
}

/// Store key of a job's per-document results
pub fn by_document_key(project: &str, job_id: &str) -> String {
    format!("{}/results/{}/by_document.json", project, job_id)
}

/// Store key of a job's summary
pub fn summary_key(project: &str, job_id: &str) -> String {
    format!("{}/results/{}/summary.json", project, job_id)
}

/// Store key of a category's cross-job aggregate
pub fn aggregate_key(project: &str, category: &str) -> String {
    format!("{}/results/aggregate/{}.json", project, category)
}

/// Store key of one document's records for one category
pub fn document_results_key(project: &str, category: &str, stem: &str) -> String {
    format!("{}/results/{}/{}.json", project, category, stem)
}

/// Prefix under which a project's manifests live
pub fn manifests_prefix(project: &str) -> String {
    format!("{}/manifests/", project)
}

/// Split a submission manifest key into project and job id
///
/// ```
/// use quarry_batch::manifest::parse_submission_key;
///
/// let parsed = parse_submission_key("P1/manifests/submission_batch_42.json");
/// assert_eq!(parsed, Some(("P1", "batch_42")));
/// assert_eq!(parse_submission_key("P1/manifests/audit_batch_42.json"), None);
/// ```
pub fn parse_submission_key(key: &str) -> Option<(&str, &str)> {
    let (project, rest) = key.split_once("/manifests/")?;
    if project.is_empty() || project.contains('/') {
        return None;
    }
    let job_id = rest.strip_prefix(SUBMISSION_PREFIX)?.strip_suffix(".json")?;
    if job_id.is_empty() || job_id.contains('/') {
        return None;
    }
    Some((project, job_id))
}

/// One request as recorded at submission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Encoded correlation id
    pub correlation_id: String,
    /// Category requested
    pub category: String,
    /// Source document name
    pub source_document: String,
}

/// What was submitted in one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionManifest {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
    /// Last status observed for the job; `queued` at submission
    pub status: JobStatus,
    /// Requests in submission order
    pub requests: Vec<ManifestEntry>,
}

impl SubmissionManifest {
    /// Store key of this manifest
    pub fn key(&self) -> String {
        submission_key(&self.project, &self.job_id)
    }

    /// The job as last recorded
    pub fn batch_job(&self) -> BatchJob {
        BatchJob {
            id: self.job_id.clone(),
            project: self.project.clone(),
            request_ids: self.requests.iter().map(|entry| entry.correlation_id.clone()).collect(),
            submitted_at: self.submitted_at,
            status: self.status,
        }
    }

    /// Distinct source documents, in submission order
    pub fn documents(&self) -> Vec<&str> {
        let mut documents: Vec<&str> = Vec::new();
        for entry in &self.requests {
            if !documents.contains(&entry.source_document.as_str()) {
                documents.push(&entry.source_document);
            }
        }
        documents
    }
}

/// Exact instructions sent in one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditManifest {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// One entry per request
    pub entries: Vec<AuditEntry>,
}

impl AuditManifest {
    /// Store key of this manifest
    pub fn key(&self) -> String {
        audit_key(&self.project, &self.job_id)
    }
}

/// Serialize `value` as pretty JSON and write it under `key`
pub(crate) fn put_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), BatchError>
where
    S: ObjectStore,
    T: Serialize,
{
    let bytes = serde_json::to_vec_pretty(value)?;
    store
        .put(key, &bytes)
        .map_err(|e| BatchError::Store(format!("{}: {}", key, e)))
}

/// Read and deserialize the JSON object under `key`, if present
pub(crate) fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>, BatchError>
where
    S: ObjectStore,
    T: DeserializeOwned,
{
    let Some(bytes) = store.get(key).map_err(|e| BatchError::Store(format!("{}: {}", key, e)))? else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| BatchError::Serialization(format!("{}: {}", key, e)))
}
