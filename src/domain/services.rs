//! Validator capability interface shared by all remote validation
//! services, and the error taxonomy their jobs surface.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::outcome::{ArtifactLocation, HarvestUnit};

/// Errors a validation job can end in.
///
/// The variants keep remote-service verdicts (`Rejected`, `ServerError`,
/// `ServiceDown`) apart from broken exchanges (`Protocol`,
/// `UnexpectedStatus`) and from plain transport failures, so callers can
/// log and classify outcomes without string matching.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The service reviewed the submission and refused it.
    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("submission exceeds the service size limit")]
    PayloadTooLarge,

    /// The service failed internally; the submission itself may be fine.
    #[error("validation service error: {0}")]
    ServerError(String),

    /// The liveness probe failed; the service is not accepting work.
    #[error("validation service is down (status {status})")]
    ServiceDown { status: u16 },

    #[error("test run not found: {0}")]
    RunNotFound(String),

    #[error("test run is not finished yet")]
    RunNotFinished,

    /// Run creation reported success without creating a run.
    #[error("service accepted the request but created no test run")]
    MissingRunId,

    #[error("unexpected status {status}: {detail}")]
    UnexpectedStatus { status: u16, detail: String },

    #[error("unexpected content type '{0}' for a validation report")]
    UnexpectedContentType(String),

    /// The reply violated the exchange protocol (missing header, empty
    /// or malformed body).
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("validation cancelled")]
    Cancelled,

    #[error("operation not supported by the {0} validator")]
    NotSupported(&'static str),
}

/// A remote validation service capable of checking harvested record
/// sets.
///
/// Implementations keep all per-job state on the stack of `submit`, so a
/// single shared instance can carry many concurrent submissions.
#[async_trait]
pub trait RecordValidator: Send + Sync {
    /// Short name used in logs and error messages.
    fn variant_name(&self) -> &'static str;

    /// Submit one harvested unit and drive it to a terminal state,
    /// persisting whatever results the service produces.
    async fn submit(
        &self,
        unit: &HarvestUnit,
        cancel: CancellationToken,
    ) -> Result<Vec<ArtifactLocation>, ValidationError>;

    /// Aggregate the persisted results into a summary report and return
    /// its path. Optional capability; variants without it return
    /// [`ValidationError::NotSupported`].
    async fn build_report(&self) -> Result<PathBuf, ValidationError>;

    /// Release held resources. Idempotent; invoked once at shutdown
    /// after all jobs reached a terminal state.
    async fn dispose(&self);
}
