//! Scripted in-memory inference service
//!
//! Jobs walk through a configurable status script, one step per `status`
//! call. Outputs are synthesized from the submitted JSONL: every request
//! gets the default completion unless a specific one was registered.

use crate::LlmError;
use chrono::Utc;
use quarry_domain::{InferenceService, JobMetadata, JobStatus, RemoteJob, RequestOutcome};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Number of calls made to each operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `submit` calls
    pub submit: usize,
    /// `status` calls
    pub status: usize,
    /// `list_jobs` calls
    pub list_jobs: usize,
    /// `fetch_outputs` calls
    pub fetch_outputs: usize,
}

#[derive(Debug)]
struct MockJob {
    job: RemoteJob,
    custom_ids: Vec<String>,
    jsonl: String,
    script: VecDeque<JobStatus>,
    outputs: Option<Vec<RequestOutcome>>,
}

#[derive(Debug)]
struct MockState {
    jobs: BTreeMap<String, MockJob>,
    order: Vec<String>,
    script: Vec<JobStatus>,
    default_completion: String,
    completions: HashMap<String, RequestOutcome>,
    unavailable: bool,
    calls: CallCounts,
}

/// Deterministic inference service for tests
///
/// Clones share state, so a test can keep a handle while the poller owns
/// another.
#[derive(Debug, Clone)]
pub struct MockInferenceService {
    state: Arc<Mutex<MockState>>,
}

impl MockInferenceService {
    /// Jobs complete on their first status check and answer `{"found": true}`
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                jobs: BTreeMap::new(),
                order: Vec::new(),
                script: vec![JobStatus::Completed],
                default_completion: r#"{"found": true}"#.to_string(),
                completions: HashMap::new(),
                unavailable: false,
                calls: CallCounts::default(),
            })),
        }
    }

    /// Status sequence followed by jobs submitted from now on
    ///
    /// The last status sticks once the script is exhausted.
    pub fn with_status_script(self, script: Vec<JobStatus>) -> Self {
        self.lock().script = script;
        self
    }

    /// Completion returned for requests without a specific one
    pub fn with_default_completion(self, completion: impl Into<String>) -> Self {
        self.lock().default_completion = completion.into();
        self
    }

    /// Answer `correlation_id` with `content`
    pub fn set_completion(&self, correlation_id: impl Into<String>, content: impl Into<String>) {
        let correlation_id = correlation_id.into();
        self.lock().completions.insert(
            correlation_id.clone(),
            RequestOutcome {
                correlation_id,
                status_code: 200,
                content: Some(content.into()),
            },
        );
    }

    /// Fail `correlation_id` with an HTTP status
    pub fn set_failure(&self, correlation_id: impl Into<String>, status_code: u16) {
        let correlation_id = correlation_id.into();
        self.lock().completions.insert(
            correlation_id.clone(),
            RequestOutcome {
                correlation_id,
                status_code,
                content: None,
            },
        );
    }

    /// Register a job that was never submitted through this handle
    pub fn add_remote_job(&self, id: impl Into<String>, project: Option<&str>, status: JobStatus, outputs: Vec<RequestOutcome>) {
        let id = id.into();
        let mut state = self.lock();
        state.order.push(id.clone());
        state.jobs.insert(
            id.clone(),
            MockJob {
                job: RemoteJob {
                    id,
                    status,
                    project: project.map(str::to_string),
                    created_at: Some(Utc::now()),
                },
                custom_ids: Vec::new(),
                jsonl: String::new(),
                script: VecDeque::new(),
                outputs: Some(outputs),
            },
        );
    }

    /// Force a job's status
    pub fn set_status(&self, job_id: &str, status: JobStatus) {
        if let Some(job) = self.lock().jobs.get_mut(job_id) {
            job.script.clear();
            job.job.status = status;
        }
    }

    /// Make every call fail with a communication error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Calls made so far
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// JSONL submitted for a job
    pub fn submitted_jsonl(&self, job_id: &str) -> Option<String> {
        self.lock().jobs.get(job_id).map(|job| job.jsonl.clone())
    }

    /// Ids of all known jobs, oldest first
    pub fn job_ids(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn guard(&self) -> Result<MutexGuard<'_, MockState>, LlmError> {
        let state = self.lock();
        if state.unavailable {
            return Err(LlmError::Communication("mock service unavailable".to_string()));
        }
        Ok(state)
    }
}

impl Default for MockInferenceService {
    fn default() -> Self {
        Self::new()
    }
}

fn custom_ids(jsonl: &str) -> Result<Vec<String>, LlmError> {
    jsonl
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line)
                .map_err(|e| LlmError::Api {
                    status: 400,
                    body: format!("invalid JSONL line: {}", e),
                })?;
            value["custom_id"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| LlmError::Api {
                    status: 400,
                    body: "line without custom_id".to_string(),
                })
        })
        .collect()
}

impl InferenceService for MockInferenceService {
    type Error = LlmError;

    fn submit(&self, jsonl: &str, metadata: &JobMetadata) -> Result<String, Self::Error> {
        let ids = custom_ids(jsonl)?;
        let mut state = self.guard()?;
        state.calls.submit += 1;

        let id = format!("batch_{}", uuid::Uuid::now_v7().simple());
        let script = state.script.iter().copied().collect();
        state.order.push(id.clone());
        state.jobs.insert(
            id.clone(),
            MockJob {
                job: RemoteJob {
                    id: id.clone(),
                    status: JobStatus::Queued,
                    project: Some(metadata.project.clone()),
                    created_at: Some(Utc::now()),
                },
                custom_ids: ids,
                jsonl: jsonl.to_string(),
                script,
                outputs: None,
            },
        );
        Ok(id)
    }

    fn status(&self, job_id: &str) -> Result<JobStatus, Self::Error> {
        let mut state = self.guard()?;
        state.calls.status += 1;

        let job = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| LlmError::JobNotFound(job_id.to_string()))?;
        if let Some(next) = job.script.pop_front() {
            job.job.status = next;
        }
        Ok(job.job.status)
    }

    fn list_jobs(&self, limit: usize) -> Result<Vec<RemoteJob>, Self::Error> {
        let mut state = self.guard()?;
        state.calls.list_jobs += 1;

        Ok(state
            .order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.jobs.get(id).map(|job| job.job.clone()))
            .collect())
    }

    fn fetch_outputs(&self, job_id: &str) -> Result<Vec<RequestOutcome>, Self::Error> {
        let mut state = self.guard()?;
        state.calls.fetch_outputs += 1;

        let job = state
            .jobs
            .get(job_id)
            .ok_or_else(|| LlmError::JobNotFound(job_id.to_string()))?;
        if job.job.status != JobStatus::Completed {
            return Err(LlmError::NotReady {
                job_id: job_id.to_string(),
                status: job.job.status.to_string(),
            });
        }

        if let Some(outputs) = &job.outputs {
            return Ok(outputs.clone());
        }
        Ok(job
            .custom_ids
            .iter()
            .map(|id| {
                state.completions.get(id).cloned().unwrap_or_else(|| RequestOutcome {
                    correlation_id: id.clone(),
                    status_code: 200,
                    content: Some(state.default_completion.clone()),
                })
            })
            .collect())
    }
}
