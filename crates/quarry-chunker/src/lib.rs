//! Quarry Chunker
//!
//! Splits document text into token-bounded chunks with overlap so each piece
//! fits the inference model's context window.
//!
//! # Algorithm
//!
//! 1. A document that fits under `max_tokens` is returned as one chunk
//! 2. Otherwise it is cut at structural boundaries (rule lines, document
//!    breaks, headings, all-caps titles)
//! 3. Sections are packed greedily; each new chunk is seeded with the tail
//!    of the previous one
//! 4. Oversized sections are re-split by paragraph, sentence, and finally
//!    fixed-size character windows
//!
//! # Example
//!
//! ```rust
//! use quarry_chunker::{ChunkerConfig, ChunkingEngine, WordTokenizer};
//! use std::sync::Arc;
//!
//! let config = ChunkerConfig { max_tokens: 50, overlap_tokens: 5, chars_per_token: 3 };
//! let engine = ChunkingEngine::new(Arc::new(WordTokenizer), config).unwrap();
//!
//! let result = engine.chunk("CFA009660", "ROP-informe.txt", "Texto breve.");
//! assert_eq!(result.chunks.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod chunking;
pub mod config;
pub mod error;
pub mod tokenizer;

pub use archive::ChunkArchive;
pub use chunking::{ChunkingEngine, ChunkingResult};
pub use config::ChunkerConfig;
pub use error::ChunkerError;
pub use tokenizer::{TiktokenTokenizer, Tokenizer, WordTokenizer};
