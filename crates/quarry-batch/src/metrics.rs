//! Metrics collection for poller sweeps

use crate::poller::SweepReport;
use std::collections::BTreeMap;

/// Counters accumulated across sweeps
#[derive(Debug, Clone, Default)]
pub struct PollerMetrics {
    /// Total sweep iterations completed
    pub sweep_count: usize,

    /// Jobs materialized
    pub jobs_materialized: usize,

    /// Records written, per category
    pub records: BTreeMap<String, usize>,

    /// Completions kept as raw text
    pub parse_failures: usize,

    /// Orphaned jobs materialized
    pub orphans_recovered: usize,

    /// Jobs whose materialization failed (each attempt counts)
    pub job_failures: usize,

    /// Sweeps that fell back to a full manifest scan
    pub registry_fallbacks: usize,

    /// Total runtime in seconds
    pub total_runtime_secs: u64,
}

impl PollerMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sweep's report into the counters
    pub fn record_sweep(&mut self, report: &SweepReport) {
        self.sweep_count += 1;
        self.jobs_materialized += report.materialized.len();
        self.orphans_recovered += report.orphans_materialized;
        self.job_failures += report.errors.len();
        if report.registry_fallback {
            self.registry_fallbacks += 1;
        }
        for summary in &report.materialized {
            self.parse_failures += summary.parse_failures;
            for (category, count) in &summary.per_category {
                *self.records.entry(category.clone()).or_insert(0) += count;
            }
        }
    }

    /// Records written across all categories
    pub fn total_records(&self) -> usize {
        self.records.values().sum()
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Poller Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            format!("Total runtime: {}s", self.total_runtime_secs),
            format!("Jobs materialized: {}", self.jobs_materialized),
            format!("Orphans recovered: {}", self.orphans_recovered),
            format!("Job failures: {}", self.job_failures),
            format!("Registry fallbacks: {}", self.registry_fallbacks),
        ];

        if !self.records.is_empty() {
            lines.push(String::new());
            lines.push("Records by category:".to_string());
            for (category, count) in &self.records {
                lines.push(format!("  {}: {}", category, count));
            }
            lines.push(format!("  Total: {}", self.total_records()));
            lines.push(format!("  Unparsed: {}", self.parse_failures));
        }

        lines.join("\n")
    }
}
