//! Synchronous validation service client.
//!
//! One POST per unit: the service validates inline and answers with the
//! result document and a `Location` header pointing at the published
//! report. Nothing is persisted on any failure path.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, CONTENT_TYPE, LOCATION},
};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::domain::outcome::{ArtifactLocation, HarvestUnit};
use crate::domain::services::{RecordValidator, ValidationError};
use crate::infrastructure::storage;

pub struct SyncValidator {
    client: Client,
    endpoint: Url,
    results_dir: PathBuf,
    disposed: AtomicBool,
}

impl SyncValidator {
    pub fn new(client: Client, endpoint: Url, results_dir: PathBuf) -> Self {
        Self {
            client,
            endpoint,
            results_dir,
            disposed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RecordValidator for SyncValidator {
    fn variant_name(&self) -> &'static str {
        "sync"
    }

    async fn submit(
        &self,
        unit: &HarvestUnit,
        cancel: CancellationToken,
    ) -> Result<Vec<ArtifactLocation>, ValidationError> {
        if cancel.is_cancelled() {
            return Err(ValidationError::Cancelled);
        }
        let payload = fs::read(&unit.path).await?;
        debug!(unit = %unit.name, bytes = payload.len(), "submitting record set");

        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload);
        let response = tokio::select! {
            result = request.send() => result?,
            _ = cancel.cancelled() => return Err(ValidationError::Cancelled),
        };

        match response.status() {
            StatusCode::CREATED => {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        ValidationError::Protocol(
                            "201 response without a Location header".to_string(),
                        )
                    })?;
                let body = response.text().await?;
                if body.is_empty() {
                    return Err(ValidationError::Protocol(
                        "201 response with an empty body".to_string(),
                    ));
                }
                // the result document is persisted verbatim under the
                // unit's own name
                let path =
                    storage::persist_result(&self.results_dir, &unit.name, body.as_bytes())
                        .await?;
                info!(unit = %unit.name, location = %location, "validation result stored");
                Ok(vec![
                    ArtifactLocation::Url(location),
                    ArtifactLocation::File(path),
                ])
            }
            StatusCode::BAD_REQUEST => Err(ValidationError::Rejected(
                "the service found the record set content invalid".to_string(),
            )),
            StatusCode::INTERNAL_SERVER_ERROR => Err(ValidationError::ServerError(
                "the service failed to process the submission, try again later".to_string(),
            )),
            status => Err(ValidationError::UnexpectedStatus {
                status: status.as_u16(),
                detail: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            }),
        }
    }

    async fn build_report(&self) -> Result<PathBuf, ValidationError> {
        Err(ValidationError::NotSupported(self.variant_name()))
    }

    async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("sync validator disposed");
    }
}
