//! Configuration management for the CLI.
//!
//! One TOML file carries every section the pipeline needs:
//!
//! ```toml
//! catalog = "/etc/quarry/categories.toml"
//!
//! [service]
//! endpoint = "https://api.openai.com"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [storage]
//! root = "/var/lib/quarry/store"
//!
//! [poller]
//! sweep_interval_secs = 300
//! ```

use crate::error::{CliError, Result};
use quarry_batch::PollerConfig;
use quarry_chunker::ChunkerConfig;
use quarry_domain::CategoryCatalog;
use quarry_extractor::RequestConfig;
use quarry_llm::AuthStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Category catalog file; the built-in catalog when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,

    /// Inference service connection
    #[serde(default)]
    pub service: ServiceSettings,

    /// Where state lives
    #[serde(default)]
    pub storage: StorageSettings,

    /// Output settings
    #[serde(default)]
    pub settings: Settings,

    /// Chunking
    #[serde(default)]
    pub chunker: ChunkerConfig,

    /// Request construction
    #[serde(default)]
    pub request: RequestConfig,

    /// Polling
    #[serde(default)]
    pub poller: PollerConfig,
}

/// Inference service connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Base URL of the batch API
    pub endpoint: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// How the key is sent
    pub auth: AuthMode,

    /// `api-version` query parameter, for deployments that need one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Attempts per HTTP call
    pub max_retries: u32,
}

/// How the API key is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Bearer token
    Bearer,
    /// `api-key` header
    ApiKey,
}

/// Where state lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Object store root (default `~/.quarry/store`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Pending registry database (default `~/.quarry/registry.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<PathBuf>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl QuarryConfig {
    /// Directory holding the config file and default state.
    pub fn home() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".quarry"))
    }

    /// Default configuration file path.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home()?.join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist; a missing default file yields the
    /// default configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                return Err(CliError::Config(format!("Config file not found: {}", path.display())));
            }
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&fs::read_to_string(&path)?)?;
        tracing::debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Parse and validate configuration from TOML.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: QuarryConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.chunker.validate().map_err(CliError::Config)?;
        self.request.validate().map_err(CliError::Config)?;
        self.poller.validate().map_err(CliError::Config)?;
        if self.service.endpoint.trim().is_empty() {
            return Err(CliError::Config("service.endpoint must not be empty".into()));
        }
        if self.service.max_retries == 0 {
            return Err(CliError::Config("service.max_retries must be greater than 0".into()));
        }
        Ok(())
    }

    /// Object store root.
    pub fn store_root(&self) -> Result<PathBuf> {
        match &self.storage.root {
            Some(root) => Ok(root.clone()),
            None => Ok(Self::home()?.join("store")),
        }
    }

    /// Pending registry database path.
    pub fn registry_path(&self) -> Result<PathBuf> {
        match &self.storage.registry {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home()?.join("registry.db")),
        }
    }

    /// Category catalog in effect.
    pub fn load_catalog(&self) -> Result<CategoryCatalog> {
        match &self.catalog {
            Some(path) => Ok(CategoryCatalog::from_toml(&fs::read_to_string(path)?)?),
            None => Ok(CategoryCatalog::default()),
        }
    }

    /// API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.service.api_key_env)
            .map_err(|_| CliError::Config(format!("Environment variable {} is not set", self.service.api_key_env)))
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            auth: AuthMode::Bearer,
            api_version: None,
            max_retries: 3,
        }
    }
}

impl From<AuthMode> for AuthStyle {
    fn from(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Bearer => AuthStyle::Bearer,
            AuthMode::ApiKey => AuthStyle::ApiKeyHeader,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}
