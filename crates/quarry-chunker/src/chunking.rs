//! Token-bounded chunking with structural splitting and overlap
//!
//! A document that fits is returned whole. Otherwise it is cut at structural
//! boundaries into sections, which are packed greedily into chunks of at
//! most `max_tokens`. Oversized sections fall back to paragraph, sentence
//! and finally character-window splitting.

use crate::config::ChunkerConfig;
use crate::error::ChunkerError;
use crate::tokenizer::Tokenizer;
use quarry_domain::{Chunk, ChunkRange, ChunkStrategy};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SEPARATOR: &str = "\n\n";

/// Boundaries that start a new section; the match stays with the section
/// that follows it.
const SECTION_PATTERNS: &[&str] = &[
    r"\n={50,}\n",
    r"\n-{50,}\n",
    r"\n--- DOCUMENT:[^\n]*---\n",
    r"\n\n#{1,3}\s+",
    r"\n\n[A-ZÁÉÍÓÚÑÜ][A-ZÁÉÍÓÚÑÜ \t]{10,}\n",
];

const PARAGRAPH_PATTERN: &str = r"\n\s*\n";

/// Sentence end followed by whitespace and an opening quote, capital or digit
const SENTENCE_PATTERN: &str = r#"[.?!…](\s+)["'“”«»¿¡]*[\p{Lu}0-9]"#;

/// Output of [`ChunkingEngine::chunk`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingResult {
    /// Chunks in order, ordinals contiguous from 0
    pub chunks: Vec<Chunk>,

    /// How the document was split
    pub strategy: ChunkStrategy,

    /// Token count of the whole document
    pub total_tokens: usize,
}

impl ChunkingResult {
    /// Whether the document was actually split into several pieces
    pub fn is_split(&self) -> bool {
        self.strategy != ChunkStrategy::None
    }
}

/// A packed piece before ordinals are assigned
#[derive(Debug)]
struct Segment {
    text: String,
    tokens: usize,
    origin: Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Accumulated units ending at this unit index
    Packed(usize),
    /// Piece of an oversized unit
    Split(usize),
}

#[derive(Debug, Default)]
struct Buffer {
    parts: Vec<String>,
    tokens: usize,
    last_unit: usize,
}

impl Buffer {
    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn text(&self) -> String {
        self.parts.join(SEPARATOR)
    }
}

/// Splits document text into token-bounded chunks
pub struct ChunkingEngine {
    tokenizer: Arc<dyn Tokenizer>,
    config: ChunkerConfig,
    section_patterns: Vec<Regex>,
    paragraph_pattern: Regex,
    sentence_pattern: Regex,
    separator_tokens: usize,
}

impl ChunkingEngine {
    /// Create an engine, rejecting invalid size limits
    pub fn new(tokenizer: Arc<dyn Tokenizer>, config: ChunkerConfig) -> Result<Self, ChunkerError> {
        config.validate().map_err(ChunkerError::Config)?;

        let compile = |p: &str| Regex::new(p).map_err(|e| ChunkerError::Config(e.to_string()));
        let section_patterns = SECTION_PATTERNS
            .iter()
            .map(|p| compile(*p))
            .collect::<Result<Vec<_>, _>>()?;
        let separator_tokens = tokenizer.count_tokens(SEPARATOR);

        Ok(Self {
            tokenizer,
            config,
            section_patterns,
            paragraph_pattern: compile(PARAGRAPH_PATTERN)?,
            sentence_pattern: compile(SENTENCE_PATTERN)?,
            separator_tokens,
        })
    }

    /// Get the engine's configuration
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Name of the tokenizer in use
    pub fn tokenizer_name(&self) -> &str {
        self.tokenizer.name()
    }

    /// Count tokens with the engine's tokenizer
    pub fn count_tokens(&self, text: &str) -> usize {
        self.tokenizer.count_tokens(text)
    }

    /// Chunk one document
    pub fn chunk(&self, project: &str, document: &str, text: &str) -> ChunkingResult {
        if text.trim().is_empty() {
            return ChunkingResult {
                chunks: Vec::new(),
                strategy: ChunkStrategy::None,
                total_tokens: 0,
            };
        }

        let total_tokens = self.count_tokens(text);
        let make_chunk = |ordinal: usize, text: String, token_count: usize, range: ChunkRange| Chunk {
            project: project.to_string(),
            document: document.to_string(),
            ordinal,
            token_count,
            text,
            range,
        };

        if total_tokens <= self.config.max_tokens {
            tracing::debug!(document, total_tokens, "Document fits in one chunk");
            return ChunkingResult {
                chunks: vec![make_chunk(0, text.to_string(), total_tokens, ChunkRange::Whole)],
                strategy: ChunkStrategy::None,
                total_tokens,
            };
        }

        tracing::info!(
            document,
            total_tokens,
            max_tokens = self.config.max_tokens,
            "Document exceeds token limit, chunking"
        );

        let sections = self.split_by_sections(text);
        let segments = self.pack(&sections);

        let ranges = Self::ranges(&segments);
        let chunks = segments
            .into_iter()
            .zip(ranges)
            .enumerate()
            .map(|(ordinal, (segment, range))| make_chunk(ordinal, segment.text, segment.tokens, range))
            .collect::<Vec<_>>();

        tracing::info!(document, sections = sections.len(), chunks = chunks.len(), "Chunking complete");

        ChunkingResult {
            chunks,
            strategy: ChunkStrategy::Sections,
            total_tokens,
        }
    }

    /// Cut text at structural boundaries, keeping each boundary with the
    /// section that follows it
    pub fn split_by_sections(&self, text: &str) -> Vec<String> {
        let mut cuts: Vec<usize> = self
            .section_patterns
            .iter()
            .flat_map(|re| re.find_iter(text).map(|m| m.start()))
            .collect();
        cuts.sort_unstable();
        cuts.dedup();

        Self::cut_at(text, &cuts)
    }

    /// Split on blank lines
    pub fn split_by_paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_pattern
            .split(text)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Split after sentence-ending punctuation
    pub fn split_by_sentences(&self, text: &str) -> Vec<String> {
        let cuts: Vec<usize> = self
            .sentence_pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|ws| ws.end()))
            .collect();

        Self::cut_at(text, &cuts)
    }

    fn cut_at(text: &str, cuts: &[usize]) -> Vec<String> {
        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut start = 0;
        for &cut in cuts.iter().chain(std::iter::once(&text.len())) {
            if cut <= start {
                continue;
            }
            let piece = text[start..cut].trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            start = cut;
        }
        pieces
    }

    /// Greedily pack units into segments of at most `max_tokens`
    fn pack(&self, units: &[String]) -> Vec<Segment> {
        let max = self.config.max_tokens;
        let mut out = Vec::new();
        let mut buffer = Buffer::default();

        for (index, unit) in units.iter().enumerate() {
            let tokens = self.count_tokens(unit);

            if tokens > max {
                self.flush(&mut buffer, &mut out);
                self.push_split(unit, index, &mut out);
            } else if !buffer.is_empty() && buffer.tokens + self.separator_tokens + tokens > max {
                let previous = self.flush(&mut buffer, &mut out);
                let overlap = self.overlap_seed(&previous, tokens);

                let candidate = if overlap.is_empty() {
                    unit.clone()
                } else {
                    format!("{}{}{}", overlap, SEPARATOR, unit)
                };
                let candidate_tokens = self.count_tokens(&candidate);

                if candidate_tokens > max {
                    self.push_split(unit, index, &mut out);
                } else {
                    buffer.parts = if overlap.is_empty() {
                        vec![unit.clone()]
                    } else {
                        vec![overlap, unit.clone()]
                    };
                    buffer.tokens = candidate_tokens;
                    buffer.last_unit = index;
                }
            } else {
                if !buffer.is_empty() {
                    buffer.tokens += self.separator_tokens;
                }
                buffer.parts.push(unit.clone());
                buffer.tokens += tokens;
                buffer.last_unit = index;
            }
        }

        self.flush(&mut buffer, &mut out);
        out
    }

    /// Emit the buffer as a segment and return its text
    ///
    /// Running counts are summed per unit; the emitted count is exact. If the
    /// exact count overshoots, the buffered parts are re-packed with exact
    /// counting instead.
    fn flush(&self, buffer: &mut Buffer, out: &mut Vec<Segment>) -> String {
        if buffer.is_empty() {
            return String::new();
        }

        let buffer = std::mem::take(buffer);
        let text = buffer.text();
        let tokens = self.count_tokens(&text);
        let origin = Origin::Packed(buffer.last_unit);

        if tokens <= self.config.max_tokens {
            out.push(Segment {
                text: text.clone(),
                tokens,
                origin,
            });
            return text;
        }

        tracing::debug!(tokens, "Buffered chunk overshot after exact count, repacking");
        let mut current = String::new();
        let mut current_tokens = 0;
        for part in buffer.parts {
            let candidate = if current.is_empty() {
                part.clone()
            } else {
                format!("{}{}{}", current, SEPARATOR, part)
            };
            let candidate_tokens = self.count_tokens(&candidate);
            if candidate_tokens > self.config.max_tokens && !current.is_empty() {
                out.push(Segment {
                    text: std::mem::take(&mut current),
                    tokens: current_tokens,
                    origin,
                });
                current_tokens = self.count_tokens(&part);
                current = part;
            } else {
                current = candidate;
                current_tokens = candidate_tokens;
            }
        }
        if !current.is_empty() {
            out.push(Segment {
                text: current,
                tokens: current_tokens,
                origin,
            });
        }
        text
    }

    /// Trailing overlap of `previous`, shrunk so it fits next to a unit of
    /// `unit_tokens`
    fn overlap_seed(&self, previous: &str, unit_tokens: usize) -> String {
        let allowed = self
            .config
            .max_tokens
            .saturating_sub(unit_tokens)
            .saturating_sub(self.separator_tokens);
        let n = self.config.overlap_tokens.min(allowed);
        if n == 0 || previous.is_empty() {
            return String::new();
        }
        self.tokenizer.tail(previous, n).trim().to_string()
    }

    fn push_split(&self, unit: &str, index: usize, out: &mut Vec<Segment>) {
        for (text, tokens) in self.split_large(unit) {
            out.push(Segment {
                text,
                tokens,
                origin: Origin::Split(index),
            });
        }
    }

    /// Re-split an oversized unit by paragraph, then sentence, then
    /// character windows
    fn split_large(&self, text: &str) -> Vec<(String, usize)> {
        let tokens = self.count_tokens(text);
        if tokens <= self.config.max_tokens {
            return vec![(text.to_string(), tokens)];
        }

        let paragraphs = self.split_by_paragraphs(text);
        if paragraphs.len() > 1 {
            return self.pack(&paragraphs).into_iter().map(|s| (s.text, s.tokens)).collect();
        }

        let sentences = self.split_by_sentences(text);
        if sentences.len() > 1 {
            return self.pack(&sentences).into_iter().map(|s| (s.text, s.tokens)).collect();
        }

        self.split_by_windows(text)
    }

    /// Last resort: fixed-size character windows, shrunk until each fits
    ///
    /// A single character that still exceeds the limit is emitted alone.
    fn split_by_windows(&self, text: &str) -> Vec<(String, usize)> {
        let max = self.config.max_tokens;
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut pieces = Vec::new();
        let mut start = 0;
        let mut width = self.config.window_chars();

        while start < char_count {
            let mut end = (start + width).min(char_count);
            let mut piece = &text[boundaries[start]..boundaries[end]];
            let mut tokens = self.count_tokens(piece);

            while tokens > max && end - start > 1 {
                let span = end - start;
                let scaled = span * max / tokens.max(1);
                let shrunk = scaled.clamp(1, span - 1);
                end = start + shrunk;
                piece = &text[boundaries[start]..boundaries[end]];
                tokens = self.count_tokens(piece);
            }

            if tokens > max {
                tracing::warn!(tokens, max, "Indivisible unit exceeds token limit, emitting alone");
            }

            if !piece.trim().is_empty() {
                pieces.push((piece.to_string(), tokens));
            }
            width = end - start;
            start = end;
        }

        pieces
    }

    fn ranges(segments: &[Segment]) -> Vec<ChunkRange> {
        let mut ranges = Vec::with_capacity(segments.len());
        let mut i = 0;
        while i < segments.len() {
            match segments[i].origin {
                Origin::Packed(last) => {
                    ranges.push(ChunkRange::ThroughSection { section: last + 1 });
                    i += 1;
                }
                Origin::Split(unit) => {
                    let total = segments[i..]
                        .iter()
                        .take_while(|s| s.origin == Origin::Split(unit))
                        .count();
                    for index in 1..=total {
                        ranges.push(ChunkRange::Fragment {
                            section: unit + 1,
                            index,
                            total,
                        });
                    }
                    i += total;
                }
            }
        }
        ranges
    }
}
