//! Extracted records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sentinel field holding unparseable completion text
pub const RAW_RESPONSE_FIELD: &str = "_raw_response";

/// Sentinel flag set alongside [`RAW_RESPONSE_FIELD`]
pub const PARSE_FAILED_FIELD: &str = "_parse_failed";

/// One structured record parsed out of a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Category the record belongs to
    pub category: String,

    /// Stem of the source document
    pub stem: String,

    /// Chunk ordinal, if the document was split
    pub ordinal: Option<usize>,

    /// Extracted fields
    pub fields: Map<String, Value>,
}

impl ExtractedRecord {
    /// Wrap raw completion text that could not be parsed
    pub fn unparsed(
        category: impl Into<String>,
        stem: impl Into<String>,
        ordinal: Option<usize>,
        raw: impl Into<String>,
    ) -> Self {
        let mut fields = Map::new();
        fields.insert(RAW_RESPONSE_FIELD.to_string(), Value::String(raw.into()));
        fields.insert(PARSE_FAILED_FIELD.to_string(), Value::Bool(true));
        Self {
            category: category.into(),
            stem: stem.into(),
            ordinal,
            fields,
        }
    }

    /// Whether this record only preserves raw text
    pub fn is_parse_failure(&self) -> bool {
        matches!(self.fields.get(PARSE_FAILED_FIELD), Some(Value::Bool(true)))
    }
}
