//! Quarry Extractor
//!
//! Everything that happens to a request on either side of the inference
//! service: building it, naming it, and reading its answer back.
//!
//! # Outbound
//!
//! - [`RequestPlanner`] chunks each document and asks [`RequestBuilder`] for
//!   one request per eligible category
//! - Every request carries a correlation id that decodes back to its parts
//!   through the [`DecoderChain`]
//! - [`to_jsonl`] renders requests as batch input lines
//!
//! # Inbound
//!
//! - [`parse_completion`] tolerates fences, concatenated objects, arrays and
//!   truncation
//! - [`normalize`] flattens nested payloads into records
//! - [`extract_records`] combines both and keeps unparseable text
//!
//! # Example
//!
//! ```rust
//! use quarry_domain::CategoryCatalog;
//! use quarry_extractor::DecoderChain;
//! use std::sync::Arc;
//!
//! let chain = DecoderChain::standard(Arc::new(CategoryCatalog::default()));
//! let id = chain.decode("CFA009660_ROP-informe_products_chunk_002").unwrap();
//! assert_eq!(id.stem, "ROP-informe");
//! assert_eq!(id.ordinal, Some(2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod config;
pub mod correlation;
pub mod error;
pub mod normalize;
pub mod parser;
pub mod prompt;
pub mod types;

pub use builder::{DocumentPlan, RequestBuilder, RequestPlan, RequestPlanner};
pub use config::RequestConfig;
pub use correlation::{CategoryNameDecoder, CorrelationDecoder, DecoderChain, PromptOrdinalDecoder};
pub use error::ExtractorError;
pub use normalize::{extract_records, normalize};
pub use parser::{parse_completion, parse_completion_detailed, ParseMethod, ParsedCompletion};
pub use prompt::PromptBuilder;
pub use types::{to_jsonl, AuditEntry, BatchRequestLine, ChatBody, ChatMessage, ExtractionRequest};
