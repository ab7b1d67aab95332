//! Quarry Inference Layer
//!
//! Implementations of the `InferenceService` trait from `quarry-domain`.
//!
//! # Services
//!
//! - `MockInferenceService`: scripted, in-memory service for tests and dry runs
//! - `HttpBatchClient`: OpenAI-compatible batch API over blocking HTTP
//!
//! # Examples
//!
//! ```
//! use quarry_domain::{InferenceService, JobMetadata, JobStatus};
//! use quarry_llm::MockInferenceService;
//!
//! let service = MockInferenceService::new();
//! let metadata = JobMetadata { project: "P1".to_string() };
//! let job = service.submit("{\"custom_id\":\"P1_doc_audit\"}\n", &metadata).unwrap();
//! assert_eq!(service.status(&job).unwrap(), JobStatus::Completed);
//! ```

#![warn(missing_docs)]

pub mod mock;
pub mod openai;

use thiserror::Error;

pub use mock::{CallCounts, MockInferenceService};
pub use openai::{parse_output_lines, AuthStyle, HttpBatchClient};

/// Errors that can occur while talking to the inference service
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error (retryable)
    #[error("Communication error: {0}")]
    Communication(String),

    /// Response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Job unknown to the service
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Outputs requested before the job completed
    #[error("Job {job_id} is not completed (status: {status})")]
    NotReady {
        /// Job id
        job_id: String,
        /// Status at the time of the request
        status: String,
    },

    /// Request rejected by the service
    #[error("HTTP {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Generic error
    #[error("Inference error: {0}")]
    Other(String),
}
