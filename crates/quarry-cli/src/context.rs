//! Wiring of configured components.

use crate::config::QuarryConfig;
use crate::error::Result;
use crate::output::Formatter;
use quarry_batch::{BatchPoller, BatchSubmitter, PollerConfig};
use quarry_chunker::{ChunkingEngine, TiktokenTokenizer};
use quarry_domain::CategoryCatalog;
use quarry_extractor::{DecoderChain, RequestBuilder, RequestPlanner};
use quarry_llm::HttpBatchClient;
use quarry_store::{FsObjectStore, SqlitePendingRegistry};
use std::sync::Arc;

/// Poller over the live service and on-disk state.
pub type LivePoller = BatchPoller<HttpBatchClient, FsObjectStore, SqlitePendingRegistry>;

/// Submitter over the live service and on-disk state.
pub type LiveSubmitter = BatchSubmitter<HttpBatchClient, FsObjectStore, SqlitePendingRegistry>;

/// Everything a command needs, built lazily from the configuration.
pub struct Context {
    /// Loaded configuration
    pub config: QuarryConfig,
    /// Category catalog in effect
    pub catalog: Arc<CategoryCatalog>,
    /// Output formatter
    pub formatter: Formatter,
}

impl Context {
    /// Create a context, loading the category catalog.
    pub fn new(config: QuarryConfig, formatter: Formatter) -> Result<Self> {
        let catalog = Arc::new(config.load_catalog()?);
        Ok(Self {
            config,
            catalog,
            formatter,
        })
    }

    /// Open the object store.
    pub fn store(&self) -> Result<FsObjectStore> {
        Ok(FsObjectStore::new(self.config.store_root()?)?)
    }

    /// Open the pending registry.
    pub fn registry(&self) -> Result<SqlitePendingRegistry> {
        let path = self.config.registry_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(SqlitePendingRegistry::new(path)?)
    }

    /// Connect to the inference service.
    ///
    /// Builds a blocking HTTP client; must not be called from async code.
    pub fn service(&self) -> Result<HttpBatchClient> {
        let settings = &self.config.service;
        let mut client = HttpBatchClient::new(&settings.endpoint, self.config.api_key()?)?
            .with_max_retries(settings.max_retries)
            .with_auth_style(settings.auth.into())
            .with_target_path(&self.config.request.endpoint_path);
        if let Some(version) = &settings.api_version {
            client = client.with_api_version(version);
        }
        tracing::debug!(endpoint = %client.endpoint(), "Service client ready");
        Ok(client)
    }

    /// Correlation id decoders for the catalog in effect.
    pub fn decoders(&self) -> DecoderChain {
        DecoderChain::standard(Arc::clone(&self.catalog))
    }

    /// Chunking engine using the tokenizer of the configured model.
    pub fn engine(&self) -> Result<ChunkingEngine> {
        let model = &self.config.request.model;
        let tokenizer = match TiktokenTokenizer::new(model) {
            Ok(tokenizer) => tokenizer,
            Err(e) => {
                tracing::warn!(model = %model, error = %e, "Unknown model, counting tokens with cl100k_base");
                TiktokenTokenizer::cl100k()?
            }
        };
        Ok(ChunkingEngine::new(Arc::new(tokenizer), self.config.chunker.clone())?)
    }

    /// Request planner.
    pub fn planner(&self) -> Result<RequestPlanner> {
        let builder = RequestBuilder::with_decoders(self.decoders(), self.config.request.clone())?;
        Ok(RequestPlanner::new(self.engine()?, builder))
    }

    /// Submitter over the live service.
    pub fn submitter(&self) -> Result<LiveSubmitter> {
        Ok(BatchSubmitter::new(
            Arc::new(self.service()?),
            Arc::new(self.store()?),
            Arc::new(self.registry()?),
            self.config.request.endpoint_path.clone(),
        ))
    }

    /// Poller over the live service.
    pub fn poller(&self) -> Result<LivePoller> {
        self.poller_with(self.config.poller.clone())
    }

    /// Poller over the live service with an adjusted configuration.
    pub fn poller_with(&self, config: PollerConfig) -> Result<LivePoller> {
        Ok(BatchPoller::new(
            Arc::new(self.service()?),
            Arc::new(self.store()?),
            Arc::new(self.registry()?),
            self.decoders(),
            config,
        )?)
    }
}
