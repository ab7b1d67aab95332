//! Payload normalization into flat records

use crate::parser::{parse_completion_detailed, strip_fence};
use quarry_domain::{Category, CorrelationId, ExtractedRecord, PayloadShape};
use serde_json::{Map, Value};

/// Turn one parsed object into records according to the category's shape
///
/// `Flat` objects pass through as one record. `Nested` objects yield one
/// record per entry of each configured list; the entry is tagged with the
/// list name and inherits metadata keys it does not define itself.
pub fn normalize(category: &Category, id: &CorrelationId, object: Map<String, Value>) -> Vec<ExtractedRecord> {
    let record = |fields: Map<String, Value>| ExtractedRecord {
        category: category.name.clone(),
        stem: id.stem.clone(),
        ordinal: id.ordinal,
        fields,
    };

    match &category.shape {
        PayloadShape::Flat => vec![record(object)],
        PayloadShape::Nested { lists, type_field } => {
            if !lists.iter().any(|list| object.contains_key(list)) {
                return vec![record(object)];
            }

            let mut metadata = object;
            let mut extracted = Vec::new();
            for list in lists {
                if let Some(value) = metadata.remove(list) {
                    extracted.push((list, value));
                }
            }

            let mut records = Vec::new();
            for (list, value) in extracted {
                let entries = match value {
                    Value::Array(entries) => entries,
                    Value::Null => continue,
                    other => vec![other],
                };

                for entry in entries {
                    let Value::Object(mut fields) = entry else {
                        tracing::warn!(id = %id, list = %list, "Skipping non-object list entry");
                        continue;
                    };
                    fields.insert(type_field.clone(), Value::String(list.clone()));
                    for (key, value) in &metadata {
                        if !fields.contains_key(key) {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                    records.push(record(fields));
                }
            }
            records
        }
    }
}

/// Parse and normalize one completion
///
/// Unparseable text yields a single sentinel record that keeps the raw
/// completion. Parseable text with no records yields an empty list.
pub fn extract_records(category: &Category, id: &CorrelationId, completion: &str) -> Vec<ExtractedRecord> {
    let parsed = parse_completion_detailed(completion);

    if parsed.objects.is_empty() {
        if completion.trim().is_empty() || looks_like_empty_json(completion) {
            tracing::warn!(id = %id, "Completion contains no records");
            return Vec::new();
        }
        tracing::warn!(id = %id, "Completion could not be parsed, keeping raw text");
        return vec![ExtractedRecord::unparsed(
            category.name.clone(),
            id.stem.clone(),
            id.ordinal,
            completion,
        )];
    }

    let records: Vec<ExtractedRecord> = parsed
        .objects
        .into_iter()
        .flat_map(|object| normalize(category, id, object))
        .collect();

    if records.is_empty() {
        tracing::warn!(id = %id, "Completion contains no records");
    } else {
        tracing::debug!(id = %id, records = records.len(), method = ?parsed.method, "Completion normalized");
    }
    records
}

/// `{}`, `[]` or a fenced equivalent
fn looks_like_empty_json(completion: &str) -> bool {
    match serde_json::from_str::<Value>(strip_fence(completion)) {
        Ok(Value::Array(items)) => items.is_empty(),
        Ok(Value::Object(map)) => map.is_empty(),
        _ => false,
    }
}
