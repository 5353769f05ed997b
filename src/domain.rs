//! Domain module - paging arithmetic, the record-set wire model, unit
//! outcomes, and the validator capability interface.
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod outcome;
pub mod paging;
pub mod record_set;
pub mod services;

// Re-export commonly used items for convenience
pub use outcome::{ArtifactLocation, HarvestUnit, JobId, OutcomeStatus, UnitOutcome};
pub use paging::PagingCursor;
pub use record_set::{RecordSetError, RecordsRequest, RecordsResponse, SearchResults};
pub use services::{RecordValidator, ValidationError};
