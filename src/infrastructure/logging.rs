//! Logging system configuration and initialization.
//!
//! Console and optional file output driven by [`LoggingConfig`]. The
//! returned guard keeps the non-blocking file writer alive; the binary
//! holds it for the lifetime of the run.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::info;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

/// Get the log directory relative to the executable location.
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize logging.
///
/// `RUST_LOG` overrides the configured level; without it, noisy
/// dependency targets are pinned down so `debug` runs stay readable.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        if !config.level.to_lowercase().contains("trace") {
            filter = filter
                .add_directive("reqwest=info".parse().unwrap())
                .add_directive("hyper=warn".parse().unwrap())
                .add_directive("h2=warn".parse().unwrap())
                .add_directive("tokio=info".parse().unwrap())
                .add_directive(format!("metaharvest={}", config.level).parse().unwrap());
        }
        filter
    });

    let registry = Registry::default().with(env_filter);

    let guard = match (config.file_output, config.console_output) {
        (true, console) => {
            let log_dir = get_log_directory();
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

            let file_appender = rolling::daily(&log_dir, "metaharvest.log");
            let (file_writer, file_guard) = non_blocking(file_appender);

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_ansi(false);
                if console {
                    let console_layer = fmt::Layer::new()
                        .with_writer(std::io::stdout)
                        .with_target(false);
                    registry.with(file_layer).with(console_layer).init();
                } else {
                    registry.with(file_layer).init();
                }
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_target(false)
                    .with_ansi(false);
                if console {
                    let console_layer = fmt::Layer::new()
                        .with_writer(std::io::stdout)
                        .with_target(false);
                    registry.with(file_layer).with(console_layer).init();
                } else {
                    registry.with(file_layer).init();
                }
            }
            Some(file_guard)
        }
        (false, true) => {
            let console_layer = fmt::Layer::new()
                .with_writer(std::io::stdout)
                .with_target(false);
            registry.with(console_layer).init();
            None
        }
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    };

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log directory: {:?}", get_log_directory());
    }

    Ok(guard)
}
