//! Bounded worker pool that drives validation jobs to terminal
//! outcomes.
//!
//! One task per unit, gated by a semaphore of `pool_size` permits. A
//! failing job never takes the pool down with it: every unit handed to
//! [`ValidationPool::run`] comes back as exactly one [`UnitOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::outcome::{HarvestUnit, JobId, UnitOutcome};
use crate::domain::services::{RecordValidator, ValidationError};

pub struct ValidationPool {
    validator: Arc<dyn RecordValidator>,
    pool_size: usize,
    cancel: CancellationToken,
}

impl ValidationPool {
    pub fn new(
        validator: Arc<dyn RecordValidator>,
        pool_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            validator,
            pool_size,
            cancel,
        }
    }

    /// Run every unit to a terminal outcome.
    ///
    /// Cancellation is checked before a job starts and observed by the
    /// validator while it runs; jobs already in flight finish their
    /// current submission so the shutdown stays orderly. Units that
    /// never started are reported as failed with a cancellation error
    /// so the accounting stays complete.
    pub async fn run(&self, units: Vec<HarvestUnit>) -> Vec<UnitOutcome> {
        if units.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        info!(
            "🚀 Dispatching {} validation jobs (pool size: {}, validator: {})",
            units.len(),
            self.pool_size,
            self.validator.variant_name()
        );

        let mut names = Vec::with_capacity(units.len());
        let mut tasks = Vec::with_capacity(units.len());
        for unit in units {
            names.push(unit.name.clone());
            let validator = Arc::clone(&self.validator);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();

            tasks.push(tokio::spawn(async move {
                let job = JobId::new();
                let started = Instant::now();

                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return UnitOutcome::failed(
                            unit.name,
                            &"worker pool closed before the job started",
                            started.elapsed(),
                        );
                    }
                };

                // a job that never started does not touch the service
                if cancel.is_cancelled() {
                    warn!("🛑 Job for {} cancelled before start", unit.name);
                    return UnitOutcome::failed(
                        unit.name,
                        &ValidationError::Cancelled,
                        started.elapsed(),
                    );
                }

                debug!(job = %job, unit = %unit.name, "job started");
                match validator.submit(&unit, cancel).await {
                    Ok(artifacts) => {
                        info!(
                            job = %job,
                            unit = %unit.name,
                            artifacts = artifacts.len(),
                            duration_ms = started.elapsed().as_millis() as u64,
                            "job succeeded"
                        );
                        UnitOutcome::succeeded(unit.name, artifacts, started.elapsed())
                    }
                    Err(err) => {
                        warn!(job = %job, unit = %unit.name, error = %err, "job failed");
                        UnitOutcome::failed(unit.name, &err, started.elapsed())
                    }
                }
            }));
        }

        let mut outcomes = Vec::with_capacity(names.len());
        for (name, joined) in names.into_iter().zip(join_all(tasks).await) {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => {
                    error!(unit = %name, %join_error, "validation task panicked");
                    outcomes.push(UnitOutcome::failed(name, &join_error, Duration::ZERO));
                }
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "Validation pool finished: {}/{} succeeded",
            succeeded,
            outcomes.len()
        );
        outcomes
    }
}
