//! Stateless batch polling
//!
//! A sweep rediscovers everything it needs from the store and the service:
//! submission manifests tell it which jobs exist, completion markers tell it
//! which ones are done, and the orphan scan catches completed jobs whose
//! manifest is missing. Nothing carries over between sweeps, so a sweep can
//! be re-run (or run from another process) at any time.

use crate::config::PollerConfig;
use crate::error::BatchError;
use crate::manifest::{
    get_json, manifests_prefix, parse_submission_key, put_json, submission_key, SubmissionManifest,
};
use crate::materializer::{JobContext, JobSummary, ResultMaterializer};
use quarry_domain::{CompletionMarker, InferenceService, JobStatus, ObjectStore, PendingRegistry};
use quarry_extractor::DecoderChain;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Where a candidate job was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// A local submission manifest
    Manifest,
    /// The service's job listing only
    Orphan,
}

/// A job's status as seen during a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusEntry {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// Status reported by the service
    pub status: JobStatus,
}

/// A job that could not be handled during a sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// External job id
    pub job_id: String,
    /// Owning project
    pub project: String,
    /// What went wrong
    pub error: String,
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Submission manifests inspected
    pub manifests_scanned: usize,
    /// Manifests skipped because their marker exists
    pub already_materialized: usize,
    /// The registry failed and every manifest was scanned
    pub registry_fallback: bool,
    /// Completed jobs found only through the service listing
    pub orphans_found: usize,
    /// Orphans materialized in this sweep
    pub orphans_materialized: usize,
    /// Jobs materialized in this sweep
    pub materialized: Vec<JobSummary>,
    /// Jobs still running
    pub deferred: Vec<JobStatusEntry>,
    /// Jobs that ended without completing
    pub terminal_failures: Vec<JobStatusEntry>,
    /// Jobs whose state could not be read; retried next sweep
    pub unreachable: Vec<JobFailure>,
    /// Jobs whose materialization failed; retried next sweep
    pub errors: Vec<JobFailure>,
}

impl SweepReport {
    /// Whether the sweep found nothing to do
    pub fn is_idle(&self) -> bool {
        self.materialized.is_empty()
            && self.deferred.is_empty()
            && self.errors.is_empty()
            && self.unreachable.is_empty()
            && self.terminal_failures.is_empty()
    }

    /// Records written across all materialized jobs
    pub fn records_written(&self) -> usize {
        self.materialized.iter().map(|s| s.records).sum()
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    context: JobContext,
    status: JobStatus,
    source: CandidateSource,
}

/// Finds completed jobs and materializes them
pub struct BatchPoller<I, S, R> {
    service: Arc<I>,
    store: Arc<S>,
    registry: Arc<R>,
    decoders: DecoderChain,
    config: PollerConfig,
}

impl<I, S, R> Clone for BatchPoller<I, S, R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            decoders: self.decoders.clone(),
            config: self.config.clone(),
        }
    }
}

impl<I, S, R> BatchPoller<I, S, R>
where
    I: InferenceService,
    S: ObjectStore,
    R: PendingRegistry,
{
    /// Create a new poller
    pub fn new(
        service: Arc<I>,
        store: Arc<S>,
        registry: Arc<R>,
        decoders: DecoderChain,
        config: PollerConfig,
    ) -> Result<Self, BatchError> {
        config.validate().map_err(BatchError::Config)?;
        Ok(Self {
            service,
            store,
            registry,
            decoders,
            config,
        })
    }

    /// Poller configuration
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run one sweep
    ///
    /// Never fails as a whole: every per-job problem is logged and recorded
    /// in the report, and the job is picked up again by the next sweep.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();

        for key in self.manifest_keys(&mut report) {
            let Some((project, job_id)) = parse_submission_key(&key) else {
                continue;
            };
            report.manifests_scanned += 1;

            match self.has_marker(project, job_id) {
                Ok(true) => {
                    report.already_materialized += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    report.unreachable.push(failure(project, job_id, e));
                    continue;
                }
            }

            let mut manifest = match get_json::<_, SubmissionManifest>(self.store.as_ref(), &key) {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(job_id, project, error = %e, "Unreadable submission manifest");
                    report.unreachable.push(failure(project, job_id, e));
                    continue;
                }
            };

            match self.service.status(job_id) {
                Ok(observed) => {
                    let status = match manifest.as_mut() {
                        Some(manifest) => self.advance_status(manifest, observed),
                        None => observed,
                    };
                    tracing::debug!(job_id, project, status = %status, "Job status");
                    candidates.insert(
                        job_id.to_string(),
                        Candidate {
                            context: JobContext {
                                job_id: job_id.to_string(),
                                project: project.to_string(),
                                manifest,
                            },
                            status,
                            source: CandidateSource::Manifest,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!(job_id, project, error = %e, "Status check failed, retrying next sweep");
                    report.unreachable.push(failure(project, job_id, e));
                }
            }
        }

        if self.config.orphan_scan {
            self.scan_orphans(&mut candidates, &mut report);
        }

        let mut completed = Vec::new();
        for candidate in candidates.into_values() {
            let entry = JobStatusEntry {
                job_id: candidate.context.job_id.clone(),
                project: candidate.context.project.clone(),
                status: candidate.status,
            };
            if candidate.status == JobStatus::Completed {
                completed.push(candidate);
            } else if candidate.status.is_failure() {
                tracing::warn!(job_id = %entry.job_id, project = %entry.project, status = %entry.status, "Job ended without completing");
                report.terminal_failures.push(entry);
            } else {
                report.deferred.push(entry);
            }
        }

        for (candidate, result) in self.materialize_all(completed) {
            match result {
                Ok(summary) => {
                    if candidate.source == CandidateSource::Orphan {
                        report.orphans_materialized += 1;
                    }
                    report.materialized.push(summary);
                }
                Err(error) => report.errors.push(JobFailure {
                    job_id: candidate.context.job_id,
                    project: candidate.context.project,
                    error,
                }),
            }
        }

        tracing::info!(
            manifests = report.manifests_scanned,
            materialized = report.materialized.len(),
            deferred = report.deferred.len(),
            orphans = report.orphans_found,
            errors = report.errors.len() + report.unreachable.len(),
            "Sweep completed"
        );

        report
    }

    /// Submission manifest keys in scope for this sweep
    fn manifest_keys(&self, report: &mut SweepReport) -> Vec<String> {
        let projects = match self.registry.pending_projects() {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!(error = %e, "Pending registry unavailable, scanning all manifests");
                report.registry_fallback = true;
                return match self.store.list("") {
                    Ok(keys) => keys.into_iter().filter(|k| parse_submission_key(k).is_some()).collect(),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to list manifests");
                        Vec::new()
                    }
                };
            }
        };

        let mut keys = Vec::new();
        for project in projects {
            match self.store.list(&manifests_prefix(&project)) {
                Ok(found) => keys.extend(found),
                Err(e) => tracing::warn!(project = %project, error = %e, "Failed to list project manifests"),
            }
        }
        keys
    }

    /// Add completed upstream jobs that no manifest accounted for
    fn scan_orphans(&self, candidates: &mut BTreeMap<String, Candidate>, report: &mut SweepReport) {
        let jobs = match self.service.list_jobs(self.config.orphan_scan_limit) {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::warn!(error = %e, "Orphan scan failed");
                return;
            }
        };

        for job in jobs {
            if job.status != JobStatus::Completed || candidates.contains_key(&job.id) {
                continue;
            }
            let Some(project) = job.project.filter(|p| is_valid_project(p)) else {
                tracing::debug!(job_id = %job.id, "Completed job without usable project metadata");
                continue;
            };
            match self.has_marker(&project, &job.id) {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    report.unreachable.push(failure(&project, &job.id, e));
                    continue;
                }
            }

            let manifest = get_json::<_, SubmissionManifest>(self.store.as_ref(), &submission_key(&project, &job.id))
                .unwrap_or_else(|e| {
                    tracing::warn!(job_id = %job.id, error = %e, "Ignoring unreadable manifest for orphan");
                    None
                });

            tracing::info!(job_id = %job.id, project = %project, "Orphaned job found");
            report.orphans_found += 1;
            candidates.insert(
                job.id.clone(),
                Candidate {
                    context: JobContext {
                        job_id: job.id,
                        project,
                        manifest,
                    },
                    status: JobStatus::Completed,
                    source: CandidateSource::Orphan,
                },
            );
        }
    }

    /// Apply an observed status to the manifest's record of the job
    ///
    /// Returns the status to act on. Forward moves are persisted; a
    /// regression leaves the recorded status in place.
    fn advance_status(&self, manifest: &mut SubmissionManifest, observed: JobStatus) -> JobStatus {
        let mut job = manifest.batch_job();
        if job.observe(observed) && job.status != manifest.status {
            manifest.status = job.status;
            if let Err(e) = put_json(self.store.as_ref(), &manifest.key(), manifest) {
                tracing::warn!(job_id = %manifest.job_id, error = %e, "Failed to record job status");
            }
        }
        job.status
    }

    fn has_marker(&self, project: &str, job_id: &str) -> Result<bool, BatchError> {
        self.store
            .exists(&CompletionMarker::key(project, job_id))
            .map_err(|e| BatchError::Store(e.to_string()))
    }

    /// Materialize completed jobs, at most `max_concurrent_jobs` at a time
    ///
    /// Jobs of one project share aggregate files, so a project's jobs always
    /// run one after another on the same worker.
    fn materialize_all(&self, completed: Vec<Candidate>) -> Vec<(Candidate, Result<JobSummary, String>)> {
        let mut by_project: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, candidate) in completed.iter().enumerate() {
            by_project.entry(candidate.context.project.as_str()).or_default().push(index);
        }
        let groups: Vec<Vec<usize>> = by_project.into_values().collect();

        let workers = self.config.max_concurrent_jobs.min(groups.len());
        if workers <= 1 {
            return completed
                .into_iter()
                .map(|candidate| {
                    let result = self.guarded(&candidate.context);
                    (candidate, result)
                })
                .collect();
        }

        let next = AtomicUsize::new(0);
        let results = Mutex::new(Vec::with_capacity(completed.len()));
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let Some(group) = groups.get(next.fetch_add(1, Ordering::SeqCst)) else {
                        break;
                    };
                    for &index in group {
                        let result = self.guarded(&completed[index].context);
                        results
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push((index, result));
                    }
                });
            }
        });

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(index, _)| *index);
        completed
            .into_iter()
            .zip(results)
            .map(|(candidate, (_, result))| (candidate, result))
            .collect()
    }

    /// Failure boundary around one job: errors and panics stay with the job
    fn guarded(&self, job: &JobContext) -> Result<JobSummary, String> {
        match catch_unwind(AssertUnwindSafe(|| self.materialize_job(job))) {
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => {
                tracing::error!(job_id = %job.job_id, project = %job.project, error = %e, "Materialization failed");
                Err(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(job_id = %job.job_id, project = %job.project, panic = %message, "Materialization panicked");
                Err(format!("panic: {}", message))
            }
        }
    }

    fn materialize_job(&self, job: &JobContext) -> Result<JobSummary, BatchError> {
        let outcomes = self
            .service
            .fetch_outputs(&job.job_id)
            .map_err(|e| BatchError::Service(e.to_string()))?;
        ResultMaterializer::new(self.store.as_ref(), self.registry.as_ref(), &self.decoders).materialize(job, &outcomes)
    }
}

fn failure(project: &str, job_id: &str, error: impl std::fmt::Display) -> JobFailure {
    JobFailure {
        job_id: job_id.to_string(),
        project: project.to_string(),
        error: error.to_string(),
    }
}

fn is_valid_project(project: &str) -> bool {
    !project.is_empty() && !project.contains('/') && project != "." && project != ".."
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
