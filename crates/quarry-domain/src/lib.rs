//! Quarry Domain Layer
//!
//! Core types and trait seams shared by every Quarry crate. Nothing in here
//! performs I/O; infrastructure lives behind the traits in [`traits`].
//!
//! ## Key Concepts
//!
//! - **SourceDocument**: plain text handed over by the text-extraction collaborator
//! - **Chunk**: a token-bounded slice of a document
//! - **Category**: one extraction intent (eligibility + instructions + payload shape)
//! - **CorrelationId**: links one outbound request to its eventual result
//! - **BatchJob / JobStatus**: one grouped submission and its monotone lifecycle
//! - **CompletionMarker**: durable proof that a job's results were materialized
//! - **ExtractedRecord**: one structured record parsed out of a completion
//!
//! ## Architecture
//!
//! - Pure data and trait definitions only
//! - Infrastructure implementations live in `quarry-llm` and `quarry-store`
//! - Application logic lives in `quarry-chunker`, `quarry-extractor` and `quarry-batch`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category;
pub mod chunk;
pub mod correlation;
pub mod document;
pub mod error;
pub mod job;
pub mod record;
pub mod traits;

// Re-exports for convenience
pub use category::{Category, CategoryCatalog, PayloadShape};
pub use chunk::{Chunk, ChunkRange, ChunkStrategy};
pub use correlation::CorrelationId;
pub use document::{derive_category_prefix, document_stem, SourceDocument};
pub use error::DomainError;
pub use job::{BatchJob, CompletionMarker, JobMetadata, JobStatus, RemoteJob, RequestOutcome};
pub use record::{ExtractedRecord, PARSE_FAILED_FIELD, RAW_RESPONSE_FIELD};
pub use traits::{InferenceService, ObjectStore, PendingEntry, PendingRegistry};
