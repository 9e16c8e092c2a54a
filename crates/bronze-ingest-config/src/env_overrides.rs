use crate::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};
use bronze_ingest_core::SourceSystem;

pub const ENV_PREFIX: &str = "BRONZE_INGEST_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the BRONZE_INGEST_ prefix
    /// Used for AWS standard variables (AWS_REGION, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Source selection
    if let Some(system) = get_env_string(env, "SOURCE_SYSTEM") {
        config.source.system = system
            .parse::<SourceSystem>()
            .context("Invalid BRONZE_INGEST_SOURCE_SYSTEM value")?;
    }
    if let Some(path) = get_env_string(env, "INPUT_PATH") {
        config.source.input_path = Some(path);
    }
    if let Some(root) = get_env_string(env, "OUTPUT_ROOT") {
        config.output.root = root;
    }

    // Storage
    if let Some(val) = get_env_usize(env, "PARQUET_ROW_GROUP_SIZE")? {
        config.storage.parquet_row_group_size = val;
    }
    // AWS standard variables first so the prefixed ones win
    if let Some(region) = env.get_raw("AWS_REGION") {
        config.storage.s3.region = Some(region);
    }
    if let Some(endpoint) = env.get_raw("AWS_ENDPOINT_URL") {
        config.storage.s3.endpoint = Some(endpoint);
    }
    if let Some(region) = get_env_string(env, "S3_REGION") {
        config.storage.s3.region = Some(region);
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT") {
        config.storage.s3.endpoint = Some(endpoint);
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        config.logging.format = format
            .parse::<LogFormat>()
            .context("Invalid BRONZE_INGEST_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key).filter(|val| !val.trim().is_empty())
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
