use anyhow::{Context, Result};
use bronze_ingest::{init_tracing, open_session};
use bronze_ingest_config::{LogFormat, RuntimeConfig};
use bronze_ingest_core::{SourceSystem, SystemClock};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

/// Batch job landing raw source feeds into the bronze layer
#[derive(Parser)]
#[command(name = "bronze-ingest")]
#[command(version)]
#[command(about = "Land raw source feeds into an append-only, date-partitioned bronze layer", long_about = None)]
struct Cli {
    /// Source system to ingest: wms, ecommerce, erp
    #[arg(short, long, value_name = "SYSTEM")]
    source_system: Option<SourceSystem>,

    /// Input location (defaults to s3://landing-zone/{source_system}/)
    #[arg(short, long, value_name = "PATH")]
    input: Option<String>,

    /// Output root holding the bronze layer (e.g. s3://global-inventory)
    #[arg(short, long, value_name = "ROOT")]
    output_root: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log format: text, json
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration (file + environment)
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority)
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging);
    info!(
        source_system = %config.source.system,
        input = %config.input_path(),
        output_root = %config.output.root,
        "Starting bronze ingestion"
    );

    // Step 3: Acquire the session; from here on it is released on every path
    let session = open_session(&config)
        .await
        .context("Failed to open ingest session")?;
    let batch_id = session.batch_id();

    let report = session.ingest(SystemClock).await.map_err(|e| {
        error!(batch_id = %batch_id, error = %e, "Ingestion run aborted");
        anyhow::Error::new(e).context(format!("Ingestion run {} aborted", batch_id))
    })?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
    );

    if !report.success {
        anyhow::bail!(
            "Ingestion run {} finished with {} failed partition(s); re-run to retry them",
            report.batch_id,
            report.failed_partitions.len()
        );
    }
    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(system) = cli.source_system {
        config.source.system = system;
    }

    if let Some(input) = &cli.input {
        config.source.input_path = Some(input.clone());
    }

    if let Some(root) = &cli.output_root {
        config.output.root = root.clone();
    }

    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
}
