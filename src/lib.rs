//! metaharvest - catalogue metadata harvesting and remote validation
//! orchestration.
//!
//! Harvests paginated record sets from a catalogue service, submits each
//! harvested batch to a pluggable remote validation service, tracks
//! asynchronous job completion, and persists the results.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export the embedding surface
pub use application::pipeline::{Pipeline, RunSummary};
pub use domain::services::{RecordValidator, ValidationError};
pub use infrastructure::config::AppConfig;
