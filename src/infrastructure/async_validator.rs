//! Asynchronous job-based validation service client.
//!
//! A submission walks five stages: liveness probe, record set upload,
//! test run creation, progress polling, report download. The failing
//! stage short-circuits the rest; the poll loop has no timeout of its
//! own and relies on the cancellation token for an orderly exit.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE, multipart};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::outcome::{ArtifactLocation, HarvestUnit, JobId};
use crate::domain::services::{RecordValidator, ValidationError};
use crate::infrastructure::{report, storage};

/// The stage a job is in, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStage {
    Heartbeat,
    Upload,
    StartRun,
    Poll,
    FetchReports,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Heartbeat => "heartbeat",
            Self::Upload => "upload",
            Self::StartRun => "start-run",
            Self::Poll => "poll",
            Self::FetchReports => "fetch-reports",
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    test_object: ObjectRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRunRequest {
    label: String,
    test_suite_ids: Vec<String>,
    test_object: ObjectRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRunResponse {
    test_run: ObjectRef,
}

pub struct AsyncJobValidator {
    client: Client,
    endpoint: Url,
    results_dir: PathBuf,
    suite_id: String,
    poll_interval: Duration,
    disposed: AtomicBool,
}

impl AsyncJobValidator {
    pub fn new(
        client: Client,
        endpoint: Url,
        results_dir: PathBuf,
        suite_id: String,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            results_dir,
            suite_id,
            poll_interval,
            disposed: AtomicBool::new(false),
        }
    }

    fn api_url(&self, suffix: &str) -> String {
        format!("{}/{}", self.endpoint.as_str().trim_end_matches('/'), suffix)
    }

    async fn send_cancellable(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ValidationError> {
        if cancel.is_cancelled() {
            return Err(ValidationError::Cancelled);
        }
        let response = tokio::select! {
            result = request.send() => result?,
            _ = cancel.cancelled() => return Err(ValidationError::Cancelled),
        };
        Ok(response)
    }

    async fn check_heartbeat(
        &self,
        job: JobId,
        cancel: &CancellationToken,
    ) -> Result<(), ValidationError> {
        debug!(job = %job, stage = %JobStage::Heartbeat, "probing service liveness");
        let response = self
            .send_cancellable(self.client.head(self.api_url("heartbeat")), cancel)
            .await?;
        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            status @ (StatusCode::NOT_FOUND
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE) => Err(ValidationError::ServiceDown {
                status: status.as_u16(),
            }),
            status => Err(unexpected(status)),
        }
    }

    async fn upload_object(
        &self,
        unit: &HarvestUnit,
        job: JobId,
        cancel: &CancellationToken,
    ) -> Result<String, ValidationError> {
        let payload = fs::read(&unit.path).await?;
        debug!(job = %job, stage = %JobStage::Upload, bytes = payload.len(), "uploading record set");

        let part = multipart::Part::bytes(payload)
            .file_name(unit.name.clone())
            .mime_str("application/json")?;
        let form = multipart::Form::new()
            .text("action", "upload")
            .part("file", part);
        let response = self
            .send_cancellable(self.client.post(self.api_url("objects")).multipart(form), cancel)
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                let parsed: UploadResponse = serde_json::from_str(&body).map_err(|error| {
                    ValidationError::Protocol(format!("malformed upload response: {error}"))
                })?;
                if parsed.test_object.id.is_empty() {
                    return Err(ValidationError::Protocol(
                        "upload response carries an empty object id".to_string(),
                    ));
                }
                Ok(parsed.test_object.id)
            }
            StatusCode::BAD_REQUEST => Err(ValidationError::Rejected(
                "the service could not use the uploaded record set".to_string(),
            )),
            StatusCode::PAYLOAD_TOO_LARGE => Err(ValidationError::PayloadTooLarge),
            status => Err(unexpected(status)),
        }
    }

    async fn start_run(
        &self,
        unit: &HarvestUnit,
        object_id: String,
        job: JobId,
        cancel: &CancellationToken,
    ) -> Result<String, ValidationError> {
        let label = format!(
            "Metadata validation - {} - {}",
            unit.name,
            Utc::now().format("%Y-%m-%dT%H:%M:%S")
        );
        debug!(job = %job, stage = %JobStage::StartRun, label = %label, "creating test run");

        let request = StartRunRequest {
            label,
            test_suite_ids: vec![self.suite_id.clone()],
            test_object: ObjectRef { id: object_id },
        };
        let response = self
            .send_cancellable(self.client.post(self.api_url("runs")).json(&request), cancel)
            .await?;

        let status = response.status();
        match status {
            StatusCode::CREATED => {
                let body = response.text().await?;
                let parsed: StartRunResponse = serde_json::from_str(&body).map_err(|error| {
                    ValidationError::Protocol(format!("malformed test run response: {error}"))
                })?;
                Ok(parsed.test_run.id)
            }
            // accepted, but nothing was created to track
            StatusCode::OK => Err(ValidationError::MissingRunId),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT => {
                Err(ValidationError::Rejected(body_detail(response).await))
            }
            StatusCode::NOT_FOUND => Err(ValidationError::RunNotFound(body_detail(response).await)),
            StatusCode::INTERNAL_SERVER_ERROR => {
                Err(ValidationError::ServerError(body_detail(response).await))
            }
            _ => Err(unexpected(status)),
        }
    }

    /// Poll the run's progress until the reported position reaches the
    /// target. Sleep first: a freshly created run has no progress yet.
    /// There is deliberately no timeout here; cancellation is the only
    /// way out of a stalled run.
    async fn await_completion(
        &self,
        run_id: &str,
        job: JobId,
        cancel: &CancellationToken,
    ) -> Result<(), ValidationError> {
        let url = self.api_url(&format!("runs/{run_id}/progress"));
        debug!(
            job = %job,
            run = %run_id,
            interval_secs = self.poll_interval.as_secs(),
            "polling until completion, no timeout"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.cancelled() => {
                    warn!(job = %job, run = %run_id, "polling cancelled");
                    return Err(ValidationError::Cancelled);
                }
            }

            let response = self
                .send_cancellable(self.client.get(&url), cancel)
                .await?;
            match response.status() {
                StatusCode::OK => {
                    let body = response.text().await?;
                    let (val, max) = parse_progress(&body)?;
                    debug!(job = %job, stage = %JobStage::Poll, run = %run_id, val, max, "test run progress");
                    if val >= max {
                        info!(job = %job, run = %run_id, "test run finished");
                        return Ok(());
                    }
                }
                StatusCode::NOT_FOUND => {
                    return Err(ValidationError::RunNotFound(run_id.to_string()));
                }
                status => return Err(unexpected(status)),
            }
        }
    }

    /// Download the HTML and JSON renditions of the run report. The file
    /// extension follows the declared content type, not the request.
    async fn fetch_reports(
        &self,
        unit: &HarvestUnit,
        run_id: &str,
        job: JobId,
    ) -> Result<Vec<ArtifactLocation>, ValidationError> {
        let mut artifacts = Vec::new();
        for rendition in ["html", "json"] {
            let url = self.api_url(&format!("runs/{run_id}.{rendition}?download=true"));
            debug!(job = %job, stage = %JobStage::FetchReports, rendition, "fetching report");
            let response = self.client.get(&url).send().await?;
            match response.status() {
                StatusCode::OK | StatusCode::ACCEPTED => {
                    let content_type = response
                        .headers()
                        .get(CONTENT_TYPE)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    let extension = extension_for(&content_type)?;
                    let bytes = response.bytes().await?;
                    let file_name = format!("{}.{}", unit.stem(), extension);
                    let path =
                        storage::persist_result(&self.results_dir, &file_name, &bytes).await?;
                    artifacts.push(ArtifactLocation::File(path));
                }
                StatusCode::NOT_FOUND => {
                    return Err(ValidationError::RunNotFound(format!(
                        "run {run_id} does not exist"
                    )));
                }
                StatusCode::NOT_ACCEPTABLE => return Err(ValidationError::RunNotFinished),
                status => return Err(unexpected(status)),
            }
        }
        info!(job = %job, unit = %unit.name, reports = artifacts.len(), "validation reports stored");
        Ok(artifacts)
    }
}

#[async_trait]
impl RecordValidator for AsyncJobValidator {
    fn variant_name(&self) -> &'static str {
        "async-job"
    }

    async fn submit(
        &self,
        unit: &HarvestUnit,
        cancel: CancellationToken,
    ) -> Result<Vec<ArtifactLocation>, ValidationError> {
        let job = JobId::new();
        info!(job = %job, unit = %unit.name, "validation job accepted");

        self.check_heartbeat(job, &cancel).await?;
        let object_id = self.upload_object(unit, job, &cancel).await?;
        let run_id = self.start_run(unit, object_id, job, &cancel).await?;
        self.await_completion(&run_id, job, &cancel).await?;
        self.fetch_reports(unit, &run_id, job).await
    }

    async fn build_report(&self) -> Result<PathBuf, ValidationError> {
        report::build_report(&self.results_dir).await
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("async-job validator disposed");
    }
}

fn unexpected(status: StatusCode) -> ValidationError {
    ValidationError::UnexpectedStatus {
        status: status.as_u16(),
        detail: status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string(),
    }
}

async fn body_detail(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) if !body.is_empty() => body,
        _ => "no detail supplied".to_string(),
    }
}

fn parse_progress(body: &str) -> Result<(u64, u64), ValidationError> {
    let document: Value = serde_json::from_str(body).map_err(|error| {
        ValidationError::Protocol(format!("malformed progress document: {error}"))
    })?;
    Ok((
        progress_field(&document, "val")?,
        progress_field(&document, "max")?,
    ))
}

// some deployments serialize the progress counters as strings
fn progress_field(document: &Value, field: &str) -> Result<u64, ValidationError> {
    let value = document.get(field).ok_or_else(|| {
        ValidationError::Protocol(format!("progress document is missing '{field}'"))
    })?;
    match value {
        Value::Number(number) => number.as_u64().ok_or_else(|| {
            ValidationError::Protocol(format!("progress '{field}' is not a non-negative integer"))
        }),
        Value::String(text) => text.parse().map_err(|_| {
            ValidationError::Protocol(format!("progress '{field}' is not a number: '{text}'"))
        }),
        _ => Err(ValidationError::Protocol(format!(
            "progress '{field}' has an unexpected type"
        ))),
    }
}

/// Map a declared content type to the report file extension.
fn extension_for(content_type: &str) -> Result<&'static str, ValidationError> {
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match media_type.as_str() {
        // "applicaton/xml" covers a known server-side misspelling
        "text/xml" | "application/xml" | "applicaton/xml" => Ok("xml"),
        "text/html" => Ok("html"),
        "application/json" => Ok("json"),
        other => Err(ValidationError::UnexpectedContentType(other.to_string())),
    }
}
