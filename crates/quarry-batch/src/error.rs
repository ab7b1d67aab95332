//! Error types for batch submission and polling

use thiserror::Error;

/// Errors that can occur while submitting, polling or materializing jobs
#[derive(Error, Debug)]
pub enum BatchError {
    /// Nothing to submit for the project
    #[error("No eligible requests for project '{0}'")]
    NoEligibleRequests(String),

    /// Inference service error
    #[error("Service error: {0}")]
    Service(String),

    /// Object store error
    #[error("Storage error: {0}")]
    Store(String),

    /// Stored object could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker error (tokio runtime issues)
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<serde_json::Error> for BatchError {
    fn from(e: serde_json::Error) -> Self {
        BatchError::Serialization(e.to_string())
    }
}
