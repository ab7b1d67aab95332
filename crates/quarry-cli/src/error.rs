//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunking error
    #[error("Chunking error: {0}")]
    Chunker(#[from] quarry_chunker::ChunkerError),

    /// Request building error
    #[error("Request error: {0}")]
    Extractor(#[from] quarry_extractor::ExtractorError),

    /// Inference service error
    #[error("Service error: {0}")]
    Service(#[from] quarry_llm::LlmError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] quarry_store::StoreError),

    /// Submission or polling error
    #[error("{0}")]
    Batch(#[from] quarry_batch::BatchError),

    /// Domain error
    #[error("{0}")]
    Domain(#[from] quarry_domain::DomainError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
