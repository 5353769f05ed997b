//! Application layer module
//!
//! Orchestrates the domain logic: the validation worker pool and the
//! end-to-end pipeline.

pub mod orchestrator;
pub mod pipeline;

// Re-export commonly used items
pub use orchestrator::ValidationPool;
pub use pipeline::{Pipeline, RunSummary};
