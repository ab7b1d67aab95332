//! Configuration for outbound extraction requests

use serde::{Deserialize, Serialize};

const DEFAULT_SYSTEM_MESSAGE: &str = "You are an expert analyst of project audit documents. \
Extract the requested information in a structured, normalized form and answer only with JSON.";

/// Model parameters and message framing for every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Model (or deployment) name sent in each request body
    pub model: String,

    /// System message sent with every request
    pub system_message: String,

    /// Completion token cap per request
    pub max_completion_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Endpoint each batch line targets
    pub endpoint_path: String,
}

impl RequestConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        if self.max_completion_tokens == 0 {
            return Err("max_completion_tokens must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature must be within 0.0..=2.0, got {}", self.temperature));
        }
        if !self.endpoint_path.starts_with('/') {
            return Err("endpoint_path must start with '/'".to_string());
        }
        Ok(())
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

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            max_completion_tokens: 1000,
            temperature: 0.3,
            endpoint_path: "/v1/chat/completions".to_string(),
        }
    }
}
