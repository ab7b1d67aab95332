//! Correlation ids - link an outbound request to its eventual result
//!
//! Encoded form: `project_documentStem_category[_chunk_###]`. Decoding needs
//! the category catalog and lives with the request builder.

use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decomposed correlation id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId {
    /// Project id (never contains `_`)
    pub project: String,

    /// Document stem (may contain `_`)
    pub stem: String,

    /// Category name
    pub category: String,

    /// Chunk ordinal, only for documents that were split
    pub ordinal: Option<usize>,
}

impl CorrelationId {
    /// Build an id, validating each component
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_domain::CorrelationId;
    ///
    /// let id = CorrelationId::new("PROJ1", "DocA", "category2", Some(7)).unwrap();
    /// assert_eq!(id.to_string(), "PROJ1_DocA_category2_chunk_007");
    /// ```
    pub fn new(
        project: impl Into<String>,
        stem: impl Into<String>,
        category: impl Into<String>,
        ordinal: Option<usize>,
    ) -> Result<Self, DomainError> {
        let id = Self {
            project: project.into(),
            stem: stem.into(),
            category: category.into(),
            ordinal,
        };

        if id.project.is_empty() || id.project.contains('_') {
            return Err(DomainError::InvalidComponent {
                component: "project",
                reason: format!("'{}' must be non-empty and free of '_'", id.project),
            });
        }
        if id.stem.is_empty() {
            return Err(DomainError::InvalidComponent {
                component: "stem",
                reason: "document stem is empty".to_string(),
            });
        }
        if id.category.is_empty() {
            return Err(DomainError::InvalidComponent {
                component: "category",
                reason: "category is empty".to_string(),
            });
        }

        Ok(id)
    }

    /// Encoded form sent as the request's custom id
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.project, self.stem, self.category)?;
        if let Some(ordinal) = self.ordinal {
            write!(f, "_chunk_{:03}", ordinal)?;
        }
        Ok(())
    }
}
