//! Configuration infrastructure.
//!
//! One JSON file describes a run: where the catalogue and the validation
//! service live, which stages are enabled, how wide the worker pool is,
//! and where the work directories sit. Every field has a default so a
//! minimal file only names the two endpoints.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::info;
use url::Url;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Catalogue endpoint and harvest settings.
    pub catalogue: CatalogueConfig,

    /// Validation service endpoint and stage switches.
    pub validator: ValidatorConfig,

    /// Worker pool settings.
    pub workers: WorkerConfig,

    /// HTTP client settings shared by all remote calls.
    pub http: HttpConfig,

    /// Work directories.
    pub directories: DirectoryConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Catalogue endpoint and harvest settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogueConfig {
    /// GetRecords endpoint URL.
    pub endpoint: String,

    /// Records requested per page.
    pub page_size: u32,

    /// Harvest from the catalogue (`false` validates the record sets
    /// already present in the records directory).
    pub harvest_records: bool,
}

/// Which validation service implementation to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidatorVariant {
    /// Single request/response validation.
    Sync,
    /// Upload, start a test run, poll, fetch reports.
    AsyncJob,
}

/// Validation service endpoint and stage switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Base URL of the validation service API.
    pub endpoint: String,

    /// Service implementation to use.
    pub variant: ValidatorVariant,

    /// Submit harvested record sets for validation.
    pub validate_records: bool,

    /// Build the aggregate report after validation.
    pub create_report: bool,

    /// Test suite the async service should execute.
    pub suite_id: String,

    /// Seconds between test run progress polls.
    pub poll_interval_seconds: u64,
}

/// Worker pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Validation jobs allowed to run concurrently.
    pub pool_size: usize,
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,

    /// Request timeout in seconds.
    pub timeout_seconds: u64,

    /// Catalogue request rate cap.
    pub max_requests_per_second: u32,
}

/// Work directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Request documents, one unit per file. Must exist when harvesting.
    pub units: PathBuf,

    /// Merged record sets land here (cleaned at the start of a harvest).
    pub records: PathBuf,

    /// Validation results land here (cleaned when validation is enabled).
    pub results: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,

    /// Enable JSON formatted file logs.
    pub json_format: bool,

    /// Enable console output.
    pub console_output: bool,

    /// Enable file output.
    pub file_output: bool,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            page_size: defaults::PAGE_SIZE,
            harvest_records: true,
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            variant: ValidatorVariant::Sync,
            validate_records: true,
            create_report: false,
            suite_id: defaults::SUITE_ID.to_string(),
            poll_interval_seconds: defaults::POLL_INTERVAL_SECONDS,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: defaults::POOL_SIZE,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            units: PathBuf::from(defaults::UNITS_DIR),
            records: PathBuf::from(defaults::RECORDS_DIR),
            results: PathBuf::from(defaults::RESULTS_DIR),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        info!("Loaded configuration from: {:?}", path);
        Ok(config)
    }

    /// Cross-field validation. Endpoints are resolved here, once, so a
    /// bad URL aborts the run before any unit is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalogue.harvest_records {
            parse_endpoint("catalogue.endpoint", &self.catalogue.endpoint)?;
            if self.catalogue.page_size == 0 {
                return Err(ConfigError::Invalid {
                    field: "catalogue.page_size",
                    reason: "must be greater than 0".to_string(),
                });
            }
        }
        if self.validator.validate_records || self.validator.create_report {
            parse_endpoint("validator.endpoint", &self.validator.endpoint)?;
        }
        if self.validator.validate_records && self.workers.pool_size == 0 {
            return Err(ConfigError::Invalid {
                field: "workers.pool_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.validator.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "validator.poll_interval_seconds",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_endpoint(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Invalid {
            field,
            reason: "endpoint is not set".to_string(),
        });
    }
    Url::parse(value).map_err(|error| ConfigError::Invalid {
        field,
        reason: error.to_string(),
    })
}

/// Default configuration values.
pub mod defaults {
    /// Default records per catalogue page.
    pub const PAGE_SIZE: u32 = 100;

    /// Default worker pool size.
    pub const POOL_SIZE: usize = 10;

    /// Default seconds between progress polls.
    pub const POLL_INTERVAL_SECONDS: u64 = 10;

    /// Default test suite driven by the async validation service.
    pub const SUITE_ID: &str = "EID9a31ecfc-6ee1-5acf-b29d-7d0644933854";

    /// Default user agent for outgoing requests.
    pub const USER_AGENT: &str = "metaharvest/0.2";

    /// Default request timeout in seconds.
    pub const TIMEOUT_SECONDS: u64 = 30;

    /// Default catalogue request rate cap.
    pub const MAX_REQUESTS_PER_SECOND: u32 = 5;

    /// Default log level.
    pub const LOG_LEVEL: &str = "info";

    /// Default unit request directory.
    pub const UNITS_DIR: &str = "work/units";

    /// Default merged record set directory.
    pub const RECORDS_DIR: &str = "work/records";

    /// Default validation result directory.
    pub const RESULTS_DIR: &str = "work/results";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.catalogue.endpoint = "http://catalogue.example/csw".to_string();
        config.validator.endpoint = "http://validator.example/v2".to_string();
        config
    }

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.catalogue.page_size, 100);
        assert_eq!(config.workers.pool_size, 10);
        assert_eq!(config.validator.poll_interval_seconds, 10);
        assert!(config.catalogue.harvest_records);
        assert!(config.validator.validate_records);
        assert!(!config.validator.create_report);
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_catalogue_endpoint_is_rejected() {
        let mut config = valid_config();
        config.catalogue.endpoint = String::new();
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("catalogue.endpoint"));
    }

    #[test]
    fn test_endpoint_not_required_when_stage_disabled() {
        let mut config = valid_config();
        config.catalogue.harvest_records = false;
        config.catalogue.endpoint = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let mut config = valid_config();
        config.catalogue.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_pool_size_is_rejected() {
        let mut config = valid_config();
        config.workers.pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_minimal_file_parses_with_defaults() {
        let raw = r#"{
            "catalogue": {"endpoint": "http://catalogue.example/csw"},
            "validator": {"endpoint": "http://validator.example/v2", "variant": "async-job"}
        }"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.validator.variant, ValidatorVariant::AsyncJob);
        assert_eq!(config.catalogue.page_size, 100);
        assert_eq!(config.directories.units, PathBuf::from("work/units"));
    }
}
