//! Result materialization
//!
//! Turns a completed job's outcomes into durable outputs. Every write is
//! keyed by project and job, so re-running a materialization that failed
//! halfway overwrites its own partial output. The completion marker is
//! written last; its presence means every other output exists.

use crate::error::BatchError;
use crate::manifest::{
    aggregate_key, by_document_key, document_results_key, get_json, put_json, summary_key, SubmissionManifest,
};
use chrono::{DateTime, Utc};
use quarry_domain::{CompletionMarker, ExtractedRecord, ObjectStore, PendingRegistry, RequestOutcome};
use quarry_extractor::{extract_records, DecoderChain};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A completed job about to be materialized
#[derive(Debug, Clone, PartialEq)]
pub struct JobContext {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// Submission manifest, absent for orphans
    pub manifest: Option<SubmissionManifest>,
}

/// One request that came back with a non-200 status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRequest {
    /// Correlation id
    pub correlation_id: String,
    /// HTTP status reported for the request
    pub status_code: u16,
}

/// Outcome accounting for one job, persisted as `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// Outcomes returned by the service
    ///
    /// Always `succeeded + failed + dropped_ids.len()`.
    pub processed: usize,
    /// Outcomes with status 200 attributed to a document and category
    pub succeeded: usize,
    /// Outcomes with any other status
    pub failed: usize,
    /// `succeeded / processed`, 0 when nothing was processed
    pub success_rate: f64,
    /// Records written, parse failures included
    pub records: usize,
    /// Completions kept only as raw text
    pub parse_failures: usize,
    /// Records per category, parse failures excluded
    pub per_category: BTreeMap<String, usize>,
    /// Requests that failed upstream
    pub failed_requests: Vec<FailedRequest>,
    /// Ids of status-200 outcomes with no matching document and category in
    /// this project; dropped
    pub dropped_ids: Vec<String>,
    /// Submitted ids with no outcome at all (manifest context only)
    pub missing_ids: Vec<String>,
    /// When materialization finished
    pub completed_at: DateTime<Utc>,
}

/// Records of one job grouped by document stem, then category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByDocument {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// stem → category → records
    pub documents: BTreeMap<String, BTreeMap<String, Vec<ExtractedRecord>>>,
}

/// One document's records for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResults {
    /// Job that produced the records
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// Category
    pub category: String,
    /// Document stem
    pub document: String,
    /// Records in chunk order
    pub records: Vec<ExtractedRecord>,
}

/// One record in a cross-job aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateEntry {
    /// Job that produced the record
    pub job_id: String,
    /// The record
    pub record: ExtractedRecord,
}

/// All records of one category across jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Category
    pub category: String,
    /// Entries in materialization order
    pub entries: Vec<AggregateEntry>,
}

/// Writes a completed job's outputs
pub struct ResultMaterializer<'a, S, R> {
    store: &'a S,
    registry: &'a R,
    decoders: &'a DecoderChain,
}

impl<'a, S, R> ResultMaterializer<'a, S, R>
where
    S: ObjectStore,
    R: PendingRegistry,
{
    /// Create a new materializer
    pub fn new(store: &'a S, registry: &'a R, decoders: &'a DecoderChain) -> Self {
        Self {
            store,
            registry,
            decoders,
        }
    }

    /// Materialize `outcomes` of a completed job
    ///
    /// Writes, in order: per-document results of the job, the category
    /// aggregates, one file per category and document, the job summary, and
    /// finally the completion marker.
    pub fn materialize(&self, job: &JobContext, outcomes: &[RequestOutcome]) -> Result<JobSummary, BatchError> {
        let project = job.project.as_str();
        let job_id = job.job_id.as_str();

        let mut documents: BTreeMap<String, BTreeMap<String, Vec<ExtractedRecord>>> = BTreeMap::new();
        let mut failed_requests = Vec::new();
        let mut dropped_ids = Vec::new();
        let mut succeeded = 0;

        for outcome in outcomes {
            if !outcome.is_success() {
                tracing::warn!(
                    job_id,
                    correlation_id = %outcome.correlation_id,
                    status_code = outcome.status_code,
                    "Request failed upstream"
                );
                failed_requests.push(FailedRequest {
                    correlation_id: outcome.correlation_id.clone(),
                    status_code: outcome.status_code,
                });
                continue;
            }

            let Some(id) = self.decoders.decode(&outcome.correlation_id) else {
                tracing::warn!(job_id, correlation_id = %outcome.correlation_id, "Unrecognized correlation id, dropping");
                dropped_ids.push(outcome.correlation_id.clone());
                continue;
            };
            if id.project != project {
                tracing::warn!(
                    job_id,
                    correlation_id = %outcome.correlation_id,
                    expected = project,
                    "Correlation id belongs to another project, dropping"
                );
                dropped_ids.push(outcome.correlation_id.clone());
                continue;
            }
            let Some(category) = self.decoders.catalog().by_name(&id.category) else {
                tracing::warn!(job_id, category = %id.category, "Unknown category, dropping");
                dropped_ids.push(outcome.correlation_id.clone());
                continue;
            };

            succeeded += 1;
            let records = extract_records(category, &id, outcome.content.as_deref().unwrap_or_default());
            documents
                .entry(id.stem.clone())
                .or_default()
                .entry(id.category.clone())
                .or_default()
                .extend(records);
        }

        for categories in documents.values_mut() {
            for records in categories.values_mut() {
                records.sort_by_key(|r| r.ordinal);
            }
        }

        // (a) per-document results of this job
        let by_document = ByDocument {
            job_id: job_id.to_string(),
            project: project.to_string(),
            documents,
        };
        put_json(self.store, &by_document_key(project, job_id), &by_document)?;

        // (b) category aggregates, replacing this job's earlier entries
        let mut per_category: BTreeMap<String, Vec<&ExtractedRecord>> = BTreeMap::new();
        for categories in by_document.documents.values() {
            for (category, records) in categories {
                per_category
                    .entry(category.clone())
                    .or_default()
                    .extend(records.iter().filter(|r| !r.is_parse_failure()));
            }
        }
        for (category, records) in &per_category {
            self.append_aggregate(project, job_id, category, records)?;
        }

        // (c) one file per category and document
        for (stem, categories) in &by_document.documents {
            for (category, records) in categories {
                let results = DocumentResults {
                    job_id: job_id.to_string(),
                    project: project.to_string(),
                    category: category.clone(),
                    document: stem.clone(),
                    records: records.clone(),
                };
                put_json(self.store, &document_results_key(project, category, stem), &results)?;
            }
        }

        // (d) summary
        let records: usize = by_document
            .documents
            .values()
            .flat_map(|categories| categories.values())
            .map(Vec::len)
            .sum();
        let clean: usize = per_category.values().map(Vec::len).sum();
        let summary = JobSummary {
            job_id: job_id.to_string(),
            project: project.to_string(),
            processed: outcomes.len(),
            succeeded,
            failed: failed_requests.len(),
            success_rate: if outcomes.is_empty() {
                0.0
            } else {
                succeeded as f64 / outcomes.len() as f64
            },
            records,
            parse_failures: records - clean,
            per_category: per_category.iter().map(|(c, r)| (c.clone(), r.len())).collect(),
            failed_requests,
            dropped_ids,
            missing_ids: missing_ids(job.manifest.as_ref(), outcomes),
            completed_at: Utc::now(),
        };
        put_json(self.store, &summary_key(project, job_id), &summary)?;

        // (e) marker, never overwritten
        let marker = CompletionMarker {
            project: project.to_string(),
            job_id: job_id.to_string(),
            completed_at: summary.completed_at,
            records,
        };
        let written = self
            .store
            .put_new(&CompletionMarker::key(project, job_id), &serde_json::to_vec_pretty(&marker)?)
            .map_err(|e| BatchError::Store(e.to_string()))?;
        if !written {
            tracing::info!(job_id, project, "Completion marker already present");
        }

        if let Err(e) = self.registry.clear_pending(project, job_id) {
            tracing::warn!(job_id, project, error = %e, "Failed to clear pending flag");
        }

        tracing::info!(
            job_id,
            project,
            processed = summary.processed,
            failed = summary.failed,
            records,
            "Job materialized"
        );

        Ok(summary)
    }

    fn append_aggregate(
        &self,
        project: &str,
        job_id: &str,
        category: &str,
        records: &[&ExtractedRecord],
    ) -> Result<(), BatchError> {
        let key = aggregate_key(project, category);
        let mut aggregate = get_json::<_, Aggregate>(self.store, &key)?.unwrap_or_else(|| Aggregate {
            category: category.to_string(),
            entries: Vec::new(),
        });

        aggregate.entries.retain(|entry| entry.job_id != job_id);
        aggregate.entries.extend(records.iter().map(|record| AggregateEntry {
            job_id: job_id.to_string(),
            record: (*record).clone(),
        }));

        put_json(self.store, &key, &aggregate)
    }
}

fn missing_ids(manifest: Option<&SubmissionManifest>, outcomes: &[RequestOutcome]) -> Vec<String> {
    let Some(manifest) = manifest else {
        return Vec::new();
    };
    let returned: BTreeSet<&str> = outcomes.iter().map(|o| o.correlation_id.as_str()).collect();
    manifest
        .requests
        .iter()
        .filter(|entry| !returned.contains(entry.correlation_id.as_str()))
        .map(|entry| entry.correlation_id.clone())
        .collect()
}
