//! Error types for domain invariants

use thiserror::Error;

/// Violations of domain invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Status string not recognised
    #[error("Unknown job status: {0}")]
    UnknownStatus(String),

    /// Correlation id component is unusable (empty or contains a separator)
    #[error("Invalid correlation id component '{component}': {reason}")]
    InvalidComponent {
        /// Which part of the id was rejected
        component: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Category catalog is inconsistent
    #[error("Invalid category catalog: {0}")]
    InvalidCatalog(String),
}
