// Configuration validation
//
// Validates that locations parse and values are sensible

use crate::*;
use anyhow::{bail, Context, Result};
use bronze_ingest_core::StoreLocation;
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_locations(config)?;
    validate_storage_config(&config.storage)?;
    validate_log_config(&config.logging)?;
    Ok(())
}

fn validate_locations(config: &RuntimeConfig) -> Result<()> {
    let input = config.input_path();
    let input_location = StoreLocation::parse(&input)
        .with_context(|| format!("source.input_path '{}' is not a valid location", input))?;

    let output_location = StoreLocation::parse(&config.output.root).with_context(|| {
        format!(
            "output.root '{}' is not a valid location",
            config.output.root
        )
    })?;

    if matches!(input_location, StoreLocation::Memory { .. })
        || matches!(output_location, StoreLocation::Memory { .. })
    {
        warn!("memory:// locations do not persist beyond the current process");
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.parquet_row_group_size == 0 {
        bail!("storage.parquet_row_group_size must be greater than 0");
    }

    if config.parquet_row_group_size > 10_000_000 {
        warn!(
            parquet_row_group_size = config.parquet_row_group_size,
            "storage.parquet_row_group_size is very large; may cause memory issues"
        );
    }

    if let Some(endpoint) = &config.s3.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("storage.s3.endpoint must start with http:// or https://");
        }
    }

    Ok(())
}

fn validate_log_config(config: &LogConfig) -> Result<()> {
    if config.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }
    Ok(())
}
