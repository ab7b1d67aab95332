//! Correlation id decoding
//!
//! Two grammars are accepted:
//! - `project_stem_category[_chunk_###]` (category matched by name)
//! - `project_stem_prompt{N}[_chunk_###]` (category matched by ordinal)
//!
//! Decoders are tried in order and the first decomposition wins. A decoder
//! never fails; it either decodes or reports no match.

use quarry_domain::{CategoryCatalog, CorrelationId};
use std::sync::Arc;

/// Parse a non-empty run of ASCII digits
fn digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Split off an optional `_chunk_###` suffix
fn strip_chunk(id: &str) -> (&str, Option<usize>) {
    if let Some(pos) = id.rfind("_chunk_") {
        if let Some(ordinal) = digits(&id[pos + "_chunk_".len()..]) {
            if pos > 0 {
                return (&id[..pos], Some(ordinal));
            }
        }
    }
    (id, None)
}

/// One correlation id grammar
pub trait CorrelationDecoder: Send + Sync {
    /// Decoder name, for logs
    fn name(&self) -> &'static str;

    /// Decode `id`, or `None` when this grammar does not match
    fn decode(&self, id: &str, catalog: &CategoryCatalog) -> Option<CorrelationId>;
}

/// Matches the longest catalog category name at the end of the id
#[derive(Debug, Default)]
pub struct CategoryNameDecoder;

impl CorrelationDecoder for CategoryNameDecoder {
    fn name(&self) -> &'static str {
        "category-name"
    }

    fn decode(&self, id: &str, catalog: &CategoryCatalog) -> Option<CorrelationId> {
        let (base, ordinal) = strip_chunk(id);

        for name in catalog.names_longest_first() {
            let Some(rest) = base.strip_suffix(name).and_then(|r| r.strip_suffix('_')) else {
                continue;
            };
            let Some((project, stem)) = rest.split_once('_') else {
                continue;
            };
            if let Ok(decoded) = CorrelationId::new(project, stem, name, ordinal) {
                return Some(decoded);
            }
        }
        None
    }
}

/// Matches `prompt{N}` and maps N to the category with that ordinal
#[derive(Debug, Default)]
pub struct PromptOrdinalDecoder;

impl CorrelationDecoder for PromptOrdinalDecoder {
    fn name(&self) -> &'static str {
        "prompt-ordinal"
    }

    fn decode(&self, id: &str, catalog: &CategoryCatalog) -> Option<CorrelationId> {
        let (base, ordinal) = strip_chunk(id);
        let pos = base.rfind("_prompt")?;
        let number = u32::try_from(digits(&base[pos + "_prompt".len()..])?).ok()?;
        let (project, stem) = base[..pos].split_once('_')?;
        let category = catalog.by_ordinal(number)?;

        CorrelationId::new(project, stem, category.name.clone(), ordinal).ok()
    }
}

/// Ordered list of decoders sharing one catalog
#[derive(Clone)]
pub struct DecoderChain {
    catalog: Arc<CategoryCatalog>,
    decoders: Arc<Vec<Box<dyn CorrelationDecoder>>>,
}

impl DecoderChain {
    /// Category names first, then prompt ordinals
    pub fn standard(catalog: Arc<CategoryCatalog>) -> Self {
        Self::with_decoders(
            catalog,
            vec![Box::new(CategoryNameDecoder), Box::new(PromptOrdinalDecoder)],
        )
    }

    /// Custom decoder order
    pub fn with_decoders(catalog: Arc<CategoryCatalog>, decoders: Vec<Box<dyn CorrelationDecoder>>) -> Self {
        Self {
            catalog,
            decoders: Arc::new(decoders),
        }
    }

    /// Catalog used for decoding
    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    /// First successful decomposition, if any
    pub fn decode(&self, id: &str) -> Option<CorrelationId> {
        self.decoders.iter().find_map(|decoder| {
            let decoded = decoder.decode(id, &self.catalog);
            if decoded.is_some() {
                tracing::trace!(id, decoder = decoder.name(), "Correlation id decoded");
            }
            decoded
        })
    }
}
