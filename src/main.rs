use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use metaharvest::application::pipeline::Pipeline;
use metaharvest::infrastructure::config::AppConfig;
use metaharvest::infrastructure::logging;

#[derive(Parser, Debug)]
#[command(
    name = "metaharvest",
    version,
    about = "Harvest catalogue metadata and validate it against remote services"
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "metaharvest.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        // the logging subscriber may not be up yet, so report on stderr
        eprintln!("Error: {err}");
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config)
        .await
        .with_context(|| format!("cannot start with configuration {:?}", cli.config))?;

    // the guard keeps the file writer alive for the whole run
    let _log_guard = logging::init(&config.logging)?;
    info!("metaharvest {} starting", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {:?}", cli.config);

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Shutdown requested; in-flight jobs will finish");
            signal_token.cancel();
        }
    });

    let pipeline = Pipeline::new(config, cancel);
    let summary = pipeline.execute().await?;

    info!(
        "Finished: {} succeeded, {} failed, {} skipped",
        summary.succeeded, summary.failed, summary.skipped
    );
    Ok(())
}
