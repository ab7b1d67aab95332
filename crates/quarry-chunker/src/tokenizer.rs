//! Token counting for chunk sizing
//!
//! Two implementations:
//! - [`TiktokenTokenizer`]: BPE counts matching the hosted model's encoding
//! - [`WordTokenizer`]: one token per whitespace-delimited word, exact and
//!   offline, used for tests and dry runs

use crate::error::ChunkerError;

/// Trait for tokenization operations needed by the chunking engine
pub trait Tokenizer: Send + Sync {
    /// Count the number of tokens in the given text
    fn count_tokens(&self, text: &str) -> usize;

    /// The trailing `n` tokens of `text`, as text
    ///
    /// Returns the whole text when it has `n` tokens or fewer.
    fn tail(&self, text: &str, n: usize) -> String;

    /// Get the name/identifier of this tokenizer
    fn name(&self) -> &str;
}

/// Tiktoken-based tokenizer
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Create a tokenizer for the encoding used by `model` (e.g. "gpt-4o")
    pub fn new(model: &str) -> Result<Self, ChunkerError> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| ChunkerError::Tokenizer(format!("Failed to initialize tokenizer: {}", e)))?;

        Ok(Self {
            bpe,
            name: model.to_string(),
        })
    }

    /// Create a cl100k_base tokenizer
    pub fn cl100k() -> Result<Self, ChunkerError> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ChunkerError::Tokenizer(format!("Failed to initialize cl100k_base: {}", e)))?;

        Ok(Self {
            bpe,
            name: "cl100k_base".to_string(),
        })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn tail(&self, text: &str, n: usize) -> String {
        if n == 0 {
            return String::new();
        }

        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= n {
            return text.to_string();
        }

        // A cut can land inside a multi-byte character; step forward until
        // the suffix decodes cleanly.
        let mut start = tokens.len() - n;
        while start < tokens.len() {
            if let Ok(decoded) = self.bpe.decode(tokens[start..].to_vec()) {
                return decoded;
            }
            start += 1;
        }
        String::new()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Whitespace word tokenizer
///
/// Each word plus its trailing whitespace is one token, so counts are
/// additive across `"\n\n"` joins of trimmed text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl WordTokenizer {
    fn word_starts(text: &str) -> Vec<usize> {
        let mut starts = Vec::new();
        let mut prev_ws = true;
        for (idx, ch) in text.char_indices() {
            let ws = ch.is_whitespace();
            if !ws && prev_ws {
                starts.push(idx);
            }
            prev_ws = ws;
        }
        starts
    }
}

impl Tokenizer for WordTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }

    fn tail(&self, text: &str, n: usize) -> String {
        if n == 0 {
            return String::new();
        }
        let starts = Self::word_starts(text);
        match starts.len() {
            0 => String::new(),
            len if len <= n => text[starts[0]..].to_string(),
            len => text[starts[len - n]..].to_string(),
        }
    }

    fn name(&self) -> &str {
        "words"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        let tok = WordTokenizer;
        assert_eq!(tok.count_tokens(""), 0);
        assert_eq!(tok.count_tokens("   \n"), 0);
        assert_eq!(tok.count_tokens("uno dos\n\ntres"), 3);
    }

    #[test]
    fn test_word_tail() {
        let tok = WordTokenizer;
        assert_eq!(tok.tail("a b c d", 2), "c d");
        assert_eq!(tok.tail("  a b", 5), "a b");
        assert_eq!(tok.tail("a b", 0), "");
        assert_eq!(tok.count_tokens(&tok.tail("uno dos tres cuatro", 3)), 3);
    }

    #[test]
    fn test_word_tail_multibyte() {
        let tok = WordTokenizer;
        assert_eq!(tok.tail("año económico señal", 2), "económico señal");
    }

    #[test]
    fn test_tiktoken_counts_and_tail() {
        let tok = TiktokenTokenizer::cl100k().unwrap();
        assert_eq!(tok.name(), "cl100k_base");
        let text = "The quick brown fox jumps over the lazy dog.";
        let count = tok.count_tokens(text);
        assert!(count > 5);

        let tail = tok.tail(text, 3);
        assert!(text.ends_with(&tail));
        assert_eq!(tok.count_tokens(&tail), 3);
        assert_eq!(tok.tail(text, count + 10), text);
    }

    #[test]
    fn test_tiktoken_from_model() {
        let tok = TiktokenTokenizer::new("gpt-4").unwrap();
        assert_eq!(tok.name(), "gpt-4");
    }
}
