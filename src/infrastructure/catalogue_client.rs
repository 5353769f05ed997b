//! Catalogue paging protocol client: count probe, page fetch, merge.

use std::num::NonZeroU32;
use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::domain::paging::PagingCursor;
use crate::domain::record_set::{self, RecordSetError, RecordsRequest, RecordsResponse};
use crate::infrastructure::http_client::{HttpClient, SendError};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Protocol(#[from] RecordSetError),

    #[error("catalogue returned status {0}")]
    Status(StatusCode),

    #[error("catalogue response is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("harvest cancelled")]
    Cancelled,
}

impl From<SendError> for HarvestError {
    fn from(error: SendError) -> Self {
        match error {
            SendError::Cancelled => Self::Cancelled,
            SendError::Transport(source) => Self::Transport(source),
        }
    }
}

/// Drives the paged harvest of one request document against a catalogue
/// endpoint. The endpoint is resolved once at construction and never
/// rewritten afterwards.
pub struct CatalogueClient {
    http: Arc<HttpClient>,
    endpoint: Url,
    page_size: NonZeroU32,
}

impl CatalogueClient {
    pub fn new(http: Arc<HttpClient>, endpoint: Url, page_size: NonZeroU32) -> Self {
        Self {
            http,
            endpoint,
            page_size,
        }
    }

    /// Harvest every record matching `request`.
    ///
    /// Runs the count probe first; `Ok(None)` means nothing matched and
    /// no page was fetched. Otherwise the pages are requested
    /// sequentially in increasing start order and merged into a single
    /// record set carrying the probed total. Any failure discards the
    /// pages fetched so far.
    pub async fn harvest(
        &self,
        request: &RecordsRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<RecordsResponse>, HarvestError> {
        request.ensure_root()?;

        let probe = request.for_count_probe();
        let response = self.exchange(&probe, cancel).await?;
        let matched = response.matched()?;
        if matched == 0 {
            debug!("count probe matched nothing");
            return Ok(None);
        }

        let cursor = PagingCursor::new(matched, self.page_size);
        info!(
            matched,
            pages = cursor.page_count(),
            page_size = cursor.page_size(),
            "count probe complete"
        );

        let mut pages = Vec::with_capacity(cursor.page_count() as usize);
        for start_position in cursor.start_positions() {
            let page_request = request.for_page(start_position, self.page_size.get());
            debug!(start_position, "fetching page");
            let page = self.exchange(&page_request, cancel).await?;
            pages.push(page);
        }

        let merged = record_set::merge_pages(pages, matched)?;
        Ok(Some(merged))
    }

    async fn exchange(
        &self,
        request: &RecordsRequest,
        cancel: &CancellationToken,
    ) -> Result<RecordsResponse, HarvestError> {
        let (status, body) = self
            .http
            .post_json_with_cancellation(self.endpoint.as_str(), request, cancel)
            .await?;
        if !status.is_success() {
            return Err(HarvestError::Status(status));
        }
        let response: RecordsResponse = serde_json::from_str(&body)?;
        response.ensure_root()?;
        Ok(response)
    }
}
