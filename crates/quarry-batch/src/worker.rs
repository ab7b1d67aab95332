//! Background worker for continuous polling

use crate::{BatchError, BatchPoller, PollerMetrics, SweepReport};
use quarry_domain::{InferenceService, ObjectStore, PendingRegistry};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{interval, Duration};

/// Background worker that sweeps on a schedule
///
/// Sweeps are blocking (service calls, store writes), so each one runs on
/// tokio's blocking pool. A sweep that fails as a whole is logged and the
/// worker carries on with the next tick.
///
/// # Examples
///
/// ```no_run
/// use quarry_batch::{BatchPoller, PollerConfig, PollerWorker};
/// use quarry_domain::CategoryCatalog;
/// use quarry_extractor::DecoderChain;
/// use quarry_llm::MockInferenceService;
/// use quarry_store::{MemoryObjectStore, MemoryPendingRegistry};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let poller = BatchPoller::new(
///         Arc::new(MockInferenceService::new()),
///         Arc::new(MemoryObjectStore::new()),
///         Arc::new(MemoryPendingRegistry::new()),
///         DecoderChain::standard(Arc::new(CategoryCatalog::default())),
///         PollerConfig::default(),
///     )?;
///     let mut worker = PollerWorker::new(poller);
///
///     // Run until Ctrl+C
///     worker.run().await?;
///     Ok(())
/// }
/// ```
pub struct PollerWorker<I, S, R> {
    poller: Arc<BatchPoller<I, S, R>>,
    interval: Duration,
    metrics: PollerMetrics,
}

impl<I, S, R> PollerWorker<I, S, R>
where
    I: InferenceService + 'static,
    S: ObjectStore + 'static,
    R: PendingRegistry + 'static,
{
    /// Create a worker around `poller`, ticking at its configured interval
    pub fn new(poller: BatchPoller<I, S, R>) -> Self {
        let interval = poller.config().sweep_interval();
        Self {
            poller: Arc::new(poller),
            interval,
            metrics: PollerMetrics::new(),
        }
    }

    /// Run the worker until a shutdown signal (Ctrl+C) is received
    ///
    /// The first sweep starts immediately.
    pub async fn run(&mut self) -> Result<(), BatchError> {
        let mut ticker = interval(self.interval);

        tracing::info!("Poller worker started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting sweep cycle");
                    if let Err(e) = self.sweep_once().await {
                        tracing::error!("Sweep failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping poller");
                    break;
                }
            }
        }

        tracing::info!("Poller stopped. Final metrics:\n{}", self.metrics.summary());

        Ok(())
    }

    /// Run for a specific number of cycles
    pub async fn run_cycles(&mut self, cycles: usize) -> Result<Vec<SweepReport>, BatchError> {
        let mut ticker = interval(self.interval);
        let mut reports = Vec::with_capacity(cycles);

        tracing::info!(
            "Poller worker started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);
            reports.push(self.sweep_once().await?);
        }

        tracing::info!("Poller finished {} cycles. Final metrics:\n{}", cycles, self.metrics.summary());

        Ok(reports)
    }

    /// Run one sweep on the blocking pool and record it
    pub async fn sweep_once(&mut self) -> Result<SweepReport, BatchError> {
        let poller = Arc::clone(&self.poller);
        let started = Instant::now();

        let report = tokio::task::spawn_blocking(move || poller.sweep())
            .await
            .map_err(|e| BatchError::Worker(e.to_string()))?;

        self.metrics.record_sweep(&report);
        self.metrics.total_runtime_secs += started.elapsed().as_secs();
        Ok(report)
    }

    /// The wrapped poller
    pub fn poller(&self) -> &BatchPoller<I, S, R> {
        &self.poller
    }

    /// Metrics accumulated so far
    pub fn metrics(&self) -> &PollerMetrics {
        &self.metrics
    }

    /// Reset the metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }
}
