//! Job module - batch jobs and their lifecycle

use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a batch job as reported by the inference service
///
/// Jobs move monotonically toward a terminal state:
/// - Queued → Validating → InProgress → Finalizing → Completed
/// - Cancelling → Cancelled
/// - Failed, Expired and Error can be reached from any non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for validation
    Queued,

    /// Input file being validated
    Validating,

    /// Requests being processed
    InProgress,

    /// Output file being assembled
    Finalizing,

    /// Cancellation requested
    Cancelling,

    /// All requests processed, outputs available
    Completed,

    /// Job failed upstream
    Failed,

    /// Job ran past its completion window
    Expired,

    /// Job was cancelled
    Cancelled,

    /// Service reported an unrecoverable error
    Error,
}

impl JobStatus {
    /// Get the wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Validating => "validating",
            JobStatus::InProgress => "in_progress",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Error => "error",
        }
    }

    /// Parse a status from its wire name (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "queued" => Some(JobStatus::Queued),
            "validating" => Some(JobStatus::Validating),
            "in_progress" => Some(JobStatus::InProgress),
            "finalizing" => Some(JobStatus::Finalizing),
            "cancelling" => Some(JobStatus::Cancelling),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "expired" => Some(JobStatus::Expired),
            "cancelled" => Some(JobStatus::Cancelled),
            "error" => Some(JobStatus::Error),
            _ => None,
        }
    }

    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        self.rank() >= 5
    }

    /// Terminal, but not `Completed`
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && *self != JobStatus::Completed
    }

    /// Position along the lifecycle; terminal states share the top rank
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Validating => 1,
            JobStatus::InProgress => 2,
            JobStatus::Finalizing | JobStatus::Cancelling => 3,
            _ => 5,
        }
    }

    /// Whether moving from `self` to `next` goes forward
    ///
    /// Staying in place is allowed. Leaving a terminal state never is.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

/// One grouped submission of extraction requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    /// External job id assigned by the inference service
    pub id: String,

    /// Project the job belongs to
    pub project: String,

    /// Correlation ids of every member request
    pub request_ids: Vec<String>,

    /// When the job was submitted
    pub submitted_at: DateTime<Utc>,

    /// Last observed status
    pub status: JobStatus,
}

impl BatchJob {
    /// Record a freshly observed upstream status
    ///
    /// Returns `true` when the status was applied. A regression (including any
    /// move away from a terminal state) is ignored and logged.
    pub fn observe(&mut self, next: JobStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            tracing::warn!(
                job_id = %self.id,
                current = %self.status,
                observed = %next,
                "Ignoring job status regression"
            );
            false
        }
    }
}

/// Metadata attached to a job at submission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    /// Owning project
    pub project: String,
}

/// A job as seen through the service's listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteJob {
    /// External job id
    pub id: String,

    /// Current status
    pub status: JobStatus,

    /// Project recorded in the job metadata, if any
    pub project: Option<String>,

    /// Creation time reported upstream
    pub created_at: Option<DateTime<Utc>>,
}

/// Raw result of one request inside a completed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Correlation id echoed back by the service
    pub correlation_id: String,

    /// HTTP status of the individual request
    pub status_code: u16,

    /// Raw completion text (absent on failure)
    pub content: Option<String>,
}

impl RequestOutcome {
    /// Whether the request succeeded upstream
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Durable proof that a job has been fully materialized
///
/// Written once, after every other output, and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMarker {
    /// Owning project
    pub project: String,

    /// Job id
    pub job_id: String,

    /// When materialization finished
    pub completed_at: DateTime<Utc>,

    /// Number of records written
    pub records: usize,
}

impl CompletionMarker {
    /// Deterministic store key for a job's marker
    pub fn key(project: &str, job_id: &str) -> String {
        format!("{}/markers/{}.json", project, job_id)
    }
}
