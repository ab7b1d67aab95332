//! Chunk module - token-bounded slices of a document

use crate::document::document_stem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a document was split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Document fit in one chunk
    None,

    /// Split along structural boundaries (with recursive fallbacks)
    Sections,
}

impl ChunkStrategy {
    /// Get the strategy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::None => "none",
            ChunkStrategy::Sections => "sections",
        }
    }
}

/// Which part of the document a chunk covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkRange {
    /// The whole document
    Whole,

    /// Accumulated sections ending at section `section` (1-based)
    ThroughSection {
        /// Last section included
        section: usize,
    },

    /// Piece `index` (1-based) of an oversized section split into `total` pieces
    Fragment {
        /// Section that was split
        section: usize,
        /// Position of this piece
        index: usize,
        /// Number of pieces
        total: usize,
    },
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkRange::Whole => write!(f, "whole document"),
            ChunkRange::ThroughSection { section } => write!(f, "through section {}", section),
            ChunkRange::Fragment {
                section,
                index,
                total,
            } => write!(f, "section {} fragment {} of {}", section, index, total),
        }
    }
}

/// A token-bounded slice of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning project
    pub project: String,

    /// Parent document name
    pub document: String,

    /// Contiguous 0-based position within the document
    pub ordinal: usize,

    /// Token count under the tokenizer that produced it
    pub token_count: usize,

    /// Chunk text
    pub text: String,

    /// Covered range descriptor
    pub range: ChunkRange,
}

impl Chunk {
    /// Stem used for this chunk, e.g. `report_chunk_003`
    pub fn label(&self) -> String {
        format!("{}_chunk_{:03}", document_stem(&self.document), self.ordinal)
    }
}
