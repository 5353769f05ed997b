//! Infrastructure layer for remote service clients, configuration,
//! logging, and filesystem persistence.

pub mod async_validator; // Job-based validation service client
pub mod catalogue_client; // Paged harvest against the catalogue
pub mod config; // Configuration loading and defaults
pub mod http_client; // Rate-limited HTTP client
pub mod logging; // Logging infrastructure
pub mod report; // Aggregate CSV report
pub mod storage; // Work directories and persisted outputs
pub mod sync_validator; // Single-request validation service client

// Re-export commonly used items
pub use async_validator::AsyncJobValidator;
pub use catalogue_client::{CatalogueClient, HarvestError};
pub use config::{AppConfig, ConfigError, ValidatorVariant};
pub use http_client::HttpClient;
pub use storage::WorkDirs;
pub use sync_validator::SyncValidator;
