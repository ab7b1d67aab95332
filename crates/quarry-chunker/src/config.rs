//! Configuration for the chunking engine

use serde::{Deserialize, Serialize};

/// Configuration for the chunking engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Maximum tokens per chunk
    pub max_tokens: usize,

    /// Tokens carried over from the end of one chunk into the next
    pub overlap_tokens: usize,

    /// Characters per token assumed when sizing last-resort windows
    pub chars_per_token: usize,
}

impl ChunkerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".to_string());
        }
        if self.overlap_tokens >= self.max_tokens {
            return Err(format!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                self.overlap_tokens, self.max_tokens
            ));
        }
        if self.chars_per_token == 0 {
            return Err("chars_per_token must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Size of a last-resort character window, in characters
    pub fn window_chars(&self) -> usize {
        self.max_tokens.saturating_mul(self.chars_per_token).max(1)
    }
}

impl Default for ChunkerConfig {
    /// Sized for 128k-context models
    fn default() -> Self {
        Self {
            max_tokens: 100_000,
            overlap_tokens: 512,
            chars_per_token: 3,
        }
    }
}

impl ChunkerConfig {
    /// Aggressive preset: small chunks for short-context models
    pub fn aggressive() -> Self {
        Self {
            max_tokens: 16_000,
            overlap_tokens: 256,
            chars_per_token: 3,
        }
    }

    /// Lenient preset: large chunks with generous overlap
    pub fn lenient() -> Self {
        Self {
            max_tokens: 120_000,
            overlap_tokens: 1_024,
            chars_per_token: 4,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
