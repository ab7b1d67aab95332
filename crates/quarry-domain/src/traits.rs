//! Trait definitions for external interactions
//!
//! These traits define the boundaries between pipeline logic and
//! infrastructure. Implementations live in `quarry-llm` and `quarry-store`.
//!
//! Every method takes `&self` so one instance can be shared across the
//! poller's worker threads.

use crate::job::{JobMetadata, JobStatus, RemoteJob, RequestOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Asynchronous batch inference service
///
/// Implemented by the infrastructure layer (quarry-llm)
pub trait InferenceService: Send + Sync {
    /// Error type for service operations
    type Error: Display;

    /// Submit newline-delimited requests as one job, returning its id
    fn submit(&self, jsonl: &str, metadata: &JobMetadata) -> Result<String, Self::Error>;

    /// Current status of a job
    fn status(&self, job_id: &str) -> Result<JobStatus, Self::Error>;

    /// Most recent jobs, newest first
    fn list_jobs(&self, limit: usize) -> Result<Vec<RemoteJob>, Self::Error>;

    /// Per-request outcomes of a completed job
    fn fetch_outputs(&self, job_id: &str) -> Result<Vec<RequestOutcome>, Self::Error>;
}

/// Durable key/value object store
///
/// Implemented by the infrastructure layer (quarry-store)
pub trait ObjectStore: Send + Sync {
    /// Error type for store operations
    type Error: Display;

    /// Write (or overwrite) an object
    fn put(&self, key: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Write an object only if absent; returns `false` when it already existed
    fn put_new(&self, key: &str, data: &[u8]) -> Result<bool, Self::Error>;

    /// Read an object
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Whether an object exists
    fn exists(&self, key: &str) -> Result<bool, Self::Error>;

    /// Keys starting with `prefix`, sorted
    fn list(&self, prefix: &str) -> Result<Vec<String>, Self::Error>;
}

/// Entry of the pending registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// Project id
    pub project: String,

    /// Whether the project is believed to have an outstanding job
    pub pending: bool,

    /// Last job id recorded for the project
    pub last_job_id: Option<String>,

    /// When the entry last changed
    pub updated_at: DateTime<Utc>,
}

/// Index of projects believed to have an outstanding job
///
/// Only narrows the poller's scope; never a source of truth.
pub trait PendingRegistry: Send + Sync {
    /// Error type for registry operations
    type Error: Display;

    /// Projects currently flagged as pending
    fn pending_projects(&self) -> Result<Vec<String>, Self::Error>;

    /// Flag a project as pending with its latest job
    fn mark_pending(&self, project: &str, job_id: &str) -> Result<(), Self::Error>;

    /// Clear the pending flag after `job_id` was materialized
    ///
    /// Leaves the flag set when a newer job has been recorded since.
    fn clear_pending(&self, project: &str, job_id: &str) -> Result<(), Self::Error>;

    /// Current entry for a project
    fn entry(&self, project: &str) -> Result<Option<PendingEntry>, Self::Error>;
}
