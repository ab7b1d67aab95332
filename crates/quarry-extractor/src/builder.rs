//! Request building and batch planning
//!
//! [`RequestBuilder`] turns one document (or one chunk of it) into one
//! request per eligible category. [`RequestPlanner`] drives the chunking
//! engine and the builder over a whole project.

use crate::config::RequestConfig;
use crate::correlation::DecoderChain;
use crate::error::ExtractorError;
use crate::prompt::PromptBuilder;
use crate::types::ExtractionRequest;
use quarry_chunker::ChunkingEngine;
use quarry_domain::{Category, CategoryCatalog, Chunk, ChunkStrategy, CorrelationId, SourceDocument};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Builds extraction requests for documents and chunks
#[derive(Clone)]
pub struct RequestBuilder {
    config: RequestConfig,
    decoders: DecoderChain,
}

impl RequestBuilder {
    /// Create a builder using the standard correlation id decoders
    pub fn new(catalog: Arc<CategoryCatalog>, config: RequestConfig) -> Result<Self, ExtractorError> {
        Self::with_decoders(DecoderChain::standard(catalog), config)
    }

    /// Create a builder verifying ids against a custom decoder chain
    pub fn with_decoders(decoders: DecoderChain, config: RequestConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        Ok(Self { config, decoders })
    }

    /// Request configuration
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Category catalog
    pub fn catalog(&self) -> &CategoryCatalog {
        self.decoders.catalog()
    }

    /// Decoder chain used to verify ids
    pub fn decoders(&self) -> &DecoderChain {
        &self.decoders
    }

    /// Categories a document prefix is eligible for
    pub fn categories_for(&self, prefix: &str) -> Vec<&Category> {
        self.catalog().for_prefix(prefix)
    }

    /// One request per eligible category for an unsplit document
    pub fn build_for_document(&self, document: &SourceDocument) -> Result<Vec<ExtractionRequest>, ExtractorError> {
        self.build(document, &document.text, None)
    }

    /// One request per eligible category for chunk `chunk.ordinal` of `total`
    pub fn build_for_chunk(
        &self,
        document: &SourceDocument,
        chunk: &Chunk,
        total: usize,
    ) -> Result<Vec<ExtractionRequest>, ExtractorError> {
        self.build(document, &chunk.text, Some((chunk.ordinal, total)))
    }

    fn build(
        &self,
        document: &SourceDocument,
        text: &str,
        part: Option<(usize, usize)>,
    ) -> Result<Vec<ExtractionRequest>, ExtractorError> {
        let mut requests = Vec::new();

        for category in self.categories_for(&document.category_prefix) {
            let correlation_id = CorrelationId::new(
                document.project.as_str(),
                document.stem(),
                category.name.as_str(),
                part.map(|(ordinal, _)| ordinal),
            )?;
            self.verify(&correlation_id)?;

            let mut prompt = PromptBuilder::new(category, &document.name, text);
            if let Some((ordinal, total)) = part {
                prompt = prompt.with_part(ordinal, total);
            }

            requests.push(ExtractionRequest {
                correlation_id,
                category: category.name.clone(),
                source_document: document.name.clone(),
                system_message: self.config.system_message.clone(),
                user_message: prompt.build(),
                model: self.config.model.clone(),
                max_completion_tokens: self.config.max_completion_tokens,
                temperature: self.config.temperature,
            });
        }

        Ok(requests)
    }

    /// The id must decode back to exactly its own parts
    fn verify(&self, id: &CorrelationId) -> Result<(), ExtractorError> {
        let encoded = id.encode();
        match self.decoders.decode(&encoded) {
            Some(decoded) if &decoded == id => Ok(()),
            _ => Err(ExtractorError::AmbiguousId(encoded)),
        }
    }
}

/// How one document was planned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPlan {
    /// Document name
    pub document: String,
    /// Chunking strategy applied
    pub strategy: ChunkStrategy,
    /// Number of pieces sent
    pub chunks: usize,
    /// Token count of the whole document
    pub total_tokens: usize,
    /// Eligible categories
    pub categories: Vec<String>,
}

/// Requests for one project, ready for submission
#[derive(Debug, Clone, Default)]
pub struct RequestPlan {
    /// Requests in document, chunk, category order
    pub requests: Vec<ExtractionRequest>,
    /// Per-document planning details
    pub documents: Vec<DocumentPlan>,
    /// Documents skipped for having no eligible category or no text
    pub skipped: Vec<String>,
}

impl RequestPlan {
    /// Whether nothing would be submitted
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Chunks documents and builds their requests
pub struct RequestPlanner {
    engine: ChunkingEngine,
    builder: RequestBuilder,
}

impl RequestPlanner {
    /// Create a new planner
    pub fn new(engine: ChunkingEngine, builder: RequestBuilder) -> Self {
        Self { engine, builder }
    }

    /// Chunking engine in use
    pub fn engine(&self) -> &ChunkingEngine {
        &self.engine
    }

    /// Request builder in use
    pub fn builder(&self) -> &RequestBuilder {
        &self.builder
    }

    /// Plan every request for `project`
    ///
    /// Fails on documents from another project and on duplicate correlation
    /// ids; documents no category applies to are skipped before chunking.
    pub fn plan(&self, project: &str, documents: &[SourceDocument]) -> Result<RequestPlan, ExtractorError> {
        let mut plan = RequestPlan::default();
        let mut seen = HashSet::new();

        for document in documents {
            if document.project != project {
                return Err(ExtractorError::ProjectMismatch {
                    document: document.name.clone(),
                    expected: project.to_string(),
                    found: document.project.clone(),
                });
            }

            let categories: Vec<String> = self
                .builder
                .categories_for(&document.category_prefix)
                .into_iter()
                .map(|c| c.name.clone())
                .collect();
            if categories.is_empty() {
                tracing::warn!(
                    project,
                    document = %document.name,
                    prefix = %document.category_prefix,
                    "No category applies to document, skipping"
                );
                plan.skipped.push(document.name.clone());
                continue;
            }

            let result = self.engine.chunk(project, &document.name, &document.text);
            if result.chunks.is_empty() {
                tracing::warn!(project, document = %document.name, "Document has no text, skipping");
                plan.skipped.push(document.name.clone());
                continue;
            }

            let mut requests = Vec::new();
            if result.is_split() {
                let total = result.chunks.len();
                for chunk in &result.chunks {
                    requests.extend(self.builder.build_for_chunk(document, chunk, total)?);
                }
            } else {
                requests.extend(self.builder.build_for_document(document)?);
            }

            for request in &requests {
                let id = request.id();
                if !seen.insert(id.clone()) {
                    return Err(ExtractorError::DuplicateId(id));
                }
            }

            tracing::debug!(
                project,
                document = %document.name,
                chunks = result.chunks.len(),
                requests = requests.len(),
                "Document planned"
            );

            plan.documents.push(DocumentPlan {
                document: document.name.clone(),
                strategy: result.strategy,
                chunks: result.chunks.len(),
                total_tokens: result.total_tokens,
                categories,
            });
            plan.requests.extend(requests);
        }

        tracing::info!(
            project,
            documents = plan.documents.len(),
            skipped = plan.skipped.len(),
            requests = plan.requests.len(),
            "Request plan built"
        );

        Ok(plan)
    }
}
