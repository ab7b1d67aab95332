//! Error types for request building

use quarry_domain::DomainError;
use thiserror::Error;

/// Errors that can occur while building extraction requests
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Domain invariant violated (bad id component, bad catalog)
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Two requests in one batch share a correlation id
    #[error("Duplicate correlation id: {0}")]
    DuplicateId(String),

    /// Encoded id would not decode back to its own parts
    #[error("Correlation id is not decodable: {0}")]
    AmbiguousId(String),

    /// Document belongs to another project
    #[error("Document '{document}' belongs to project '{found}', expected '{expected}'")]
    ProjectMismatch {
        /// Document name
        document: String,
        /// Project requested
        expected: String,
        /// Project on the document
        found: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::Serialization(e.to_string())
    }
}
