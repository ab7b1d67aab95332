//! Quarry Batch
//!
//! Submission, polling and materialization of batch extraction jobs.
//!
//! # Overview
//!
//! - [`BatchSubmitter`] sends a project's requests as one job and records a
//!   submission manifest, an audit manifest and a pending-registry entry
//! - [`BatchPoller`] sweeps for completed jobs without keeping any state of
//!   its own: manifests and completion markers in the object store are the
//!   only source of truth
//! - [`ResultMaterializer`] turns a completed job into per-document results,
//!   category aggregates and a summary, writing the completion marker last
//! - [`PollerWorker`] runs sweeps on an interval until Ctrl+C
//!
//! # Store layout
//!
//! | Key | Content |
//! |-----|---------|
//! | `{project}/manifests/submission_{job}.json` | What was submitted |
//! | `{project}/manifests/audit_{job}.json` | Exact prompts sent |
//! | `{project}/results/{job}/by_document.json` | Records by document and category |
//! | `{project}/results/aggregate/{category}.json` | Records across jobs |
//! | `{project}/results/{category}/{stem}.json` | One document, one category |
//! | `{project}/results/{job}/summary.json` | Outcome accounting |
//! | `{project}/markers/{job}.json` | Completion marker |
//!
//! # Configuration
//!
//! ```toml
//! [poller]
//! sweep_interval_secs = 300
//! orphan_scan = true
//! orphan_scan_limit = 100
//! max_concurrent_jobs = 1
//! ```
//!
//! # Example
//!
//! ```
//! use quarry_batch::{BatchPoller, BatchSubmitter, PollerConfig};
//! use quarry_domain::{CategoryCatalog, SourceDocument};
//! use quarry_extractor::{DecoderChain, RequestBuilder, RequestConfig};
//! use quarry_llm::MockInferenceService;
//! use quarry_store::{MemoryObjectStore, MemoryPendingRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(CategoryCatalog::default());
//! let service = Arc::new(MockInferenceService::new());
//! let store = Arc::new(MemoryObjectStore::new());
//! let registry = Arc::new(MemoryPendingRegistry::new());
//!
//! let builder = RequestBuilder::new(catalog.clone(), RequestConfig::default())?;
//! let requests = builder.build_for_document(&SourceDocument::new("P1", "IXP-1.txt", "informe"))?;
//! BatchSubmitter::new(service.clone(), store.clone(), registry.clone(), "/v1/chat/completions")
//!     .submit("P1", &requests)?;
//!
//! let poller = BatchPoller::new(service, store, registry, DecoderChain::standard(catalog), PollerConfig::default())?;
//! let report = poller.sweep();
//! assert_eq!(report.materialized.len(), 1);
//! assert!(poller.sweep().materialized.is_empty());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
pub mod manifest;
pub mod materializer;
mod metrics;
pub mod poller;
mod submitter;
mod worker;

pub use config::PollerConfig;
pub use error::BatchError;
pub use manifest::{AuditManifest, ManifestEntry, SubmissionManifest};
pub use materializer::{Aggregate, ByDocument, DocumentResults, JobContext, JobSummary, ResultMaterializer};
pub use metrics::PollerMetrics;
pub use poller::{BatchPoller, CandidateSource, JobFailure, JobStatusEntry, SweepReport};
pub use submitter::BatchSubmitter;
pub use worker::PollerWorker;
