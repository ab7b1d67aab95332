//! Error types for the chunker

use thiserror::Error;

/// Errors that can occur while chunking
#[derive(Error, Debug)]
pub enum ChunkerError {
    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tokenizer could not be initialised
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Chunk archive store error
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChunkerError {
    fn from(e: serde_json::Error) -> Self {
        ChunkerError::Serialization(e.to_string())
    }
}
