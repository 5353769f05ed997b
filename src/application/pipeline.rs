//! End-to-end run: prepare directories, collect units, validate,
//! report, summarize.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::application::orchestrator::ValidationPool;
use crate::domain::outcome::{HarvestUnit, OutcomeStatus, UnitOutcome};
use crate::domain::record_set::summarize_by_organisation;
use crate::domain::services::RecordValidator;
use crate::infrastructure::async_validator::AsyncJobValidator;
use crate::infrastructure::catalogue_client::{CatalogueClient, HarvestError};
use crate::infrastructure::config::{AppConfig, ValidatorVariant};
use crate::infrastructure::http_client::{self, HttpClient};
use crate::infrastructure::storage::WorkDirs;
use crate::infrastructure::sync_validator::SyncValidator;

/// What a run did, for the final log line and for callers embedding the
/// pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<UnitOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    fn new(outcomes: Vec<UnitOutcome>, report: Option<PathBuf>, elapsed: Duration) -> Self {
        let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
        Self {
            succeeded: count(OutcomeStatus::Succeeded),
            failed: count(OutcomeStatus::Failed),
            skipped: count(OutcomeStatus::Skipped),
            outcomes,
            report,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// One configured execution of harvest and validation.
pub struct Pipeline {
    config: AppConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: AppConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Execute the run. Per-unit failures become outcomes; only setup
    /// problems (bad configuration, missing directories) abort the run
    /// as a whole.
    pub async fn execute(&self) -> Result<RunSummary> {
        let started = Instant::now();
        let harvesting = self.config.catalogue.harvest_records;
        let validating = self.config.validator.validate_records;
        let reporting = self.config.validator.create_report;

        let dirs = WorkDirs::new(&self.config.directories);
        dirs.prepare(harvesting, validating).await?;

        let mut outcomes = Vec::new();
        let units = if harvesting {
            self.harvest_units(&dirs, &mut outcomes).await?
        } else {
            info!("Harvest disabled; using existing record sets");
            dirs.list_record_sets().await?
        };

        let validator: Option<Arc<dyn RecordValidator>> = if validating || reporting {
            Some(self.build_validator()?)
        } else {
            None
        };

        if validating {
            if let Some(validator) = &validator {
                let pool = ValidationPool::new(
                    Arc::clone(validator),
                    self.config.workers.pool_size,
                    self.cancel.clone(),
                );
                outcomes.extend(pool.run(units).await);
            }
        } else if !units.is_empty() {
            info!(
                "Validation disabled; {} record sets left for a later run",
                units.len()
            );
        }

        let mut report = None;
        if reporting {
            if let Some(validator) = &validator {
                match validator.build_report().await {
                    Ok(path) => report = Some(path),
                    Err(error) => warn!(%error, "aggregate report could not be built"),
                }
            }
        }

        if let Some(validator) = &validator {
            validator.dispose().await;
        }

        let summary = RunSummary::new(outcomes, report, started.elapsed());
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = summary.elapsed_ms,
            "run complete"
        );
        Ok(summary)
    }

    /// Harvest every unit file. Returns the units whose merged record
    /// sets are ready for validation; zero-match and failed units go
    /// straight into `outcomes`.
    async fn harvest_units(
        &self,
        dirs: &WorkDirs,
        outcomes: &mut Vec<UnitOutcome>,
    ) -> Result<Vec<HarvestUnit>> {
        let endpoint = Url::parse(&self.config.catalogue.endpoint)
            .context("catalogue endpoint is not a valid URL")?;
        let page_size = NonZeroU32::new(self.config.catalogue.page_size)
            .context("catalogue page size must be greater than 0")?;
        let http = Arc::new(HttpClient::new(&self.config.http)?);
        let client = CatalogueClient::new(http, endpoint, page_size);

        let unit_files = dirs.list_units().await?;
        info!("Starting harvest of {} units", unit_files.len());

        let mut ready = Vec::new();
        for unit in unit_files {
            if self.cancel.is_cancelled() {
                outcomes.push(UnitOutcome::failed(
                    unit.name,
                    &HarvestError::Cancelled,
                    Duration::ZERO,
                ));
                continue;
            }

            let started = Instant::now();
            match self.harvest_one(&client, dirs, &unit).await {
                Ok(Some(record_set)) => ready.push(record_set),
                Ok(None) => {
                    info!(unit = %unit.name, "no matching records; skipping validation");
                    outcomes.push(UnitOutcome::skipped(unit.name));
                }
                Err(error) => {
                    warn!(unit = %unit.name, %error, "harvest failed");
                    outcomes.push(UnitOutcome::failed(unit.name, &error, started.elapsed()));
                }
            }
        }
        Ok(ready)
    }

    async fn harvest_one(
        &self,
        client: &CatalogueClient,
        dirs: &WorkDirs,
        unit: &HarvestUnit,
    ) -> Result<Option<HarvestUnit>> {
        let request = dirs.load_request(unit).await?;
        let Some(merged) = client.harvest(&request, &self.cancel).await? else {
            return Ok(None);
        };

        if let Some(results) = &merged.search_results {
            let statistics = summarize_by_organisation(&results.records);
            for (organisation, records) in &statistics {
                debug!(unit = %unit.name, organisation = %organisation, records, "harvest statistics");
            }
            info!(
                unit = %unit.name,
                records = results.records.len(),
                organisations = statistics.len(),
                "harvest complete"
            );
        }

        let path = dirs.save_record_set(&unit.name, &merged).await?;
        Ok(Some(HarvestUnit {
            name: unit.name.clone(),
            path,
        }))
    }

    fn build_validator(&self) -> Result<Arc<dyn RecordValidator>> {
        let endpoint = Url::parse(&self.config.validator.endpoint)
            .context("validator endpoint is not a valid URL")?;
        let client = http_client::build_client(&self.config.http)?;
        let results_dir = self.config.directories.results.clone();

        Ok(match self.config.validator.variant {
            ValidatorVariant::Sync => Arc::new(SyncValidator::new(client, endpoint, results_dir)),
            ValidatorVariant::AsyncJob => Arc::new(AsyncJobValidator::new(
                client,
                endpoint,
                results_dir,
                self.config.validator.suite_id.clone(),
                Duration::from_secs(self.config.validator.poll_interval_seconds),
            )),
        })
    }
}
