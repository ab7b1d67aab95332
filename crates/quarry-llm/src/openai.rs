//! OpenAI-compatible batch API client
//!
//! Submission is a two-step exchange: the JSONL input is uploaded as a file
//! with `purpose=batch`, then a batch is created referencing that file. The
//! finished batch exposes an output file (and possibly an error file) whose
//! lines carry one response per correlation id.
//!
//! # Examples
//!
//! ```no_run
//! use quarry_llm::HttpBatchClient;
//!
//! let client = HttpBatchClient::new("https://api.openai.com", "sk-...").unwrap();
//! ```

use crate::LlmError;
use chrono::{DateTime, Utc};
use quarry_domain::{InferenceService, JobMetadata, JobStatus, RemoteJob, RequestOutcome};
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default timeout per HTTP request (uploads can be large)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of attempts per operation
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default completion window requested for each batch
pub const DEFAULT_COMPLETION_WINDOW: &str = "24h";

/// How the API key is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>` (Azure deployments)
    ApiKeyHeader,
}

/// Blocking client for an OpenAI-compatible batch API
pub struct HttpBatchClient {
    endpoint: String,
    api_key: String,
    auth: AuthStyle,
    api_version: Option<String>,
    target_path: String,
    client: Client,
    max_retries: u32,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Serialize)]
struct CreateBatchRequest<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
    metadata: HashMap<&'a str, &'a str>,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    output_file_id: Option<String>,
    #[serde(default)]
    error_file_id: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    created_at: Option<i64>,
}

#[derive(Deserialize)]
struct BatchList {
    data: Vec<BatchObject>,
}

impl BatchObject {
    fn job_status(&self) -> Result<JobStatus, LlmError> {
        JobStatus::parse(&self.status)
            .ok_or_else(|| LlmError::InvalidResponse(format!("unknown batch status '{}'", self.status)))
    }

    fn project(&self) -> Option<String> {
        let metadata = self.metadata.as_ref()?;
        metadata
            .get("project")
            .or_else(|| metadata.get("project_name"))
            .filter(|p| !p.is_empty())
            .cloned()
    }
}

impl HttpBatchClient {
    /// Create a client for `endpoint` (scheme + host, no path)
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            auth: AuthStyle::Bearer,
            api_version: None,
            target_path: "/v1/chat/completions".to_string(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Set the maximum number of attempts per operation
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Present the key with a different header
    pub fn with_auth_style(mut self, auth: AuthStyle) -> Self {
        self.auth = auth;
        self
    }

    /// Append `api-version` to every request (Azure deployments)
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Endpoint each batch line targets
    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = path.into();
        self
    }

    /// Base endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = match self.auth {
            AuthStyle::Bearer => request.bearer_auth(&self.api_key),
            AuthStyle::ApiKeyHeader => request.header("api-key", &self.api_key),
        };
        match &self.api_version {
            Some(version) => request.query(&[("api-version", version.as_str())]),
            None => request,
        }
    }

    /// Send a request, retrying transient failures with exponential backoff
    ///
    /// `build` is called once per attempt since request bodies (multipart
    /// forms in particular) cannot be replayed.
    fn send<F>(&self, operation: &str, build: F) -> Result<Response, LlmError>
    where
        F: Fn() -> Result<RequestBuilder, LlmError>,
    {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self.authorize(build()?).send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let body = response.text().unwrap_or_else(|_| "Unknown error".to_string());
                    match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            return Err(LlmError::Unauthorized(body));
                        }
                        StatusCode::NOT_FOUND => return Err(LlmError::JobNotFound(body)),
                        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                            last_error = Some(LlmError::Communication(format!("HTTP {}: {}", s, body)));
                        }
                        s => {
                            return Err(LlmError::Api {
                                status: s.as_u16(),
                                body,
                            })
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                tracing::warn!(operation, attempt = attempts, delay_secs = delay.as_secs(), "Retrying request");
                std::thread::sleep(delay);
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }

    fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, LlmError> {
        response
            .json::<T>()
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    fn retrieve(&self, job_id: &str) -> Result<BatchObject, LlmError> {
        let url = self.url(&format!("/v1/batches/{}", job_id));
        let response = self.send("retrieve", || Ok(self.client.get(&url)))?;
        Self::json(response)
    }

    fn download(&self, file_id: &str) -> Result<String, LlmError> {
        let url = self.url(&format!("/v1/files/{}/content", file_id));
        let response = self.send("download", || Ok(self.client.get(&url)))?;
        response
            .text()
            .map_err(|e| LlmError::Communication(format!("Failed to read file {}: {}", file_id, e)))
    }

    fn upload(&self, jsonl: &str) -> Result<String, LlmError> {
        let url = self.url("/v1/files");
        let response = self.send("upload", || {
            let part = multipart::Part::bytes(jsonl.as_bytes().to_vec())
                .file_name("batch_input.jsonl")
                .mime_str("application/jsonl")
                .map_err(|e| LlmError::Other(format!("Invalid mime type: {}", e)))?;
            let form = multipart::Form::new().text("purpose", "batch").part("file", part);
            Ok(self.client.post(&url).multipart(form))
        })?;
        Ok(Self::json::<FileObject>(response)?.id)
    }
}

impl InferenceService for HttpBatchClient {
    type Error = LlmError;

    fn submit(&self, jsonl: &str, metadata: &JobMetadata) -> Result<String, Self::Error> {
        let file_id = self.upload(jsonl)?;
        tracing::debug!(file_id = %file_id, project = %metadata.project, "Batch input uploaded");

        let url = self.url("/v1/batches");
        let body = CreateBatchRequest {
            input_file_id: &file_id,
            endpoint: &self.target_path,
            completion_window: DEFAULT_COMPLETION_WINDOW,
            metadata: HashMap::from([("project", metadata.project.as_str())]),
        };
        let response = self.send("create", || Ok(self.client.post(&url).json(&body)))?;
        let batch: BatchObject = Self::json(response)?;

        tracing::info!(job_id = %batch.id, project = %metadata.project, status = %batch.status, "Batch created");
        Ok(batch.id)
    }

    fn status(&self, job_id: &str) -> Result<JobStatus, Self::Error> {
        self.retrieve(job_id)?.job_status()
    }

    fn list_jobs(&self, limit: usize) -> Result<Vec<RemoteJob>, Self::Error> {
        let url = self.url("/v1/batches");
        let limit = limit.to_string();
        let response = self.send("list", || Ok(self.client.get(&url).query(&[("limit", limit.as_str())])))?;
        let list: BatchList = Self::json(response)?;

        let mut jobs = Vec::with_capacity(list.data.len());
        for batch in list.data {
            let Ok(status) = batch.job_status() else {
                tracing::warn!(job_id = %batch.id, status = %batch.status, "Skipping batch with unknown status");
                continue;
            };
            jobs.push(RemoteJob {
                project: batch.project(),
                created_at: batch.created_at.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                id: batch.id,
                status,
            });
        }
        Ok(jobs)
    }

    fn fetch_outputs(&self, job_id: &str) -> Result<Vec<RequestOutcome>, Self::Error> {
        let batch = self.retrieve(job_id)?;
        let status = batch.job_status()?;
        if status != JobStatus::Completed {
            return Err(LlmError::NotReady {
                job_id: job_id.to_string(),
                status: status.to_string(),
            });
        }

        let mut outcomes = Vec::new();
        if let Some(file_id) = &batch.output_file_id {
            outcomes.extend(parse_output_lines(&self.download(file_id)?));
        }
        if let Some(file_id) = &batch.error_file_id {
            outcomes.extend(parse_output_lines(&self.download(file_id)?));
        }

        tracing::debug!(job_id, outcomes = outcomes.len(), "Batch outputs downloaded");
        Ok(outcomes)
    }
}

#[derive(Deserialize)]
struct OutputLine {
    custom_id: String,
    #[serde(default)]
    response: Option<OutputResponse>,
}

#[derive(Deserialize)]
struct OutputResponse {
    status_code: u16,
    #[serde(default)]
    body: serde_json::Value,
}

/// Parse batch output (or error) file content into outcomes
///
/// Lines without a response count as failed with status 500. Malformed
/// lines cannot be attributed to a request and are skipped.
pub fn parse_output_lines(content: &str) -> Vec<RequestOutcome> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<OutputLine>(line) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed output line");
                None
            }
        })
        .map(|line| match line.response {
            Some(response) => {
                let content = response.body["choices"][0]["message"]["content"]
                    .as_str()
                    .map(str::to_string);
                RequestOutcome {
                    correlation_id: line.custom_id,
                    status_code: response.status_code,
                    content,
                }
            }
            None => RequestOutcome {
                correlation_id: line.custom_id,
                status_code: 500,
                content: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = HttpBatchClient::new("https://api.example.com/", "key")
            .unwrap()
            .with_max_retries(5)
            .with_auth_style(AuthStyle::ApiKeyHeader)
            .with_api_version("2024-07-01");
        assert_eq!(client.endpoint(), "https://api.example.com");
        assert_eq!(client.max_retries, 5);
        assert_eq!(client.auth, AuthStyle::ApiKeyHeader);
        assert_eq!(client.url("/v1/files"), "https://api.example.com/v1/files");
    }

    #[test]
    fn test_max_retries_at_least_one() {
        let client = HttpBatchClient::new("http://localhost", "key").unwrap().with_max_retries(0);
        assert_eq!(client.max_retries, 1);
    }

    #[test]
    fn test_parse_output_lines() {
        let content = concat!(
            r#"{"id":"r1","custom_id":"P1_doc_audit","response":{"status_code":200,"body":{"choices":[{"message":{"role":"assistant","content":"{\"a\":1}"}}]}},"error":null}"#,
            "\n\n",
            r#"{"id":"r2","custom_id":"P1_doc_products","response":{"status_code":429,"body":{"error":{"message":"rate"}}},"error":null}"#,
            "\n",
            r#"{"id":"r3","custom_id":"P1_doc_disbursements","response":null,"error":{"code":"x","message":"y"}}"#,
            "\n",
            "not json\n",
        );
        let outcomes = parse_output_lines(content);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert_eq!(outcomes[0].content.as_deref(), Some("{\"a\":1}"));
        assert_eq!(outcomes[1].status_code, 429);
        assert_eq!(outcomes[1].content, None);
        assert_eq!(outcomes[2].status_code, 500);
    }

    #[test]
    fn test_batch_project_from_metadata() {
        let batch: BatchObject = serde_json::from_str(
            r#"{"id":"b1","status":"completed","metadata":{"project_name":"P7"},"created_at":1700000000}"#,
        )
        .unwrap();
        assert_eq!(batch.project().as_deref(), Some("P7"));
        assert_eq!(batch.job_status().unwrap(), JobStatus::Completed);

        let batch: BatchObject = serde_json::from_str(r#"{"id":"b2","status":"in_progress","metadata":null}"#).unwrap();
        assert_eq!(batch.project(), None);
    }

    #[test]
    fn test_unreachable_endpoint_is_communication_error() {
        let client = HttpBatchClient::new("http://127.0.0.1:1", "key").unwrap().with_max_retries(1);
        assert!(matches!(client.status("batch_1"), Err(LlmError::Communication(_))));
    }
}
