// bronze-ingest-config - Run configuration for the bronze ingestion job
//
// Supports configuration from multiple sources:
// 1. CLI flags (applied by the binary, highest priority)
// 2. Environment variables (BRONZE_INGEST_* prefix)
// 3. Config file path from BRONZE_INGEST_CONFIG env var
// 4. Config file contents from BRONZE_INGEST_CONFIG_CONTENT env var
// 5. Default config file location (./bronze-ingest.toml)
// 6. Defaults derived from the source system (lowest priority)
//
// Only source_system, input_path and output_root change what the job does.
// Storage and logging settings are operational knobs.

use anyhow::Result;
use bronze_ingest_core::{FileFormat, SourceSystem};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Output root used when none is configured.
pub const DEFAULT_OUTPUT_ROOT: &str = "s3://global-inventory";

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Which feed to ingest and where it lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub system: SourceSystem,
    /// Overrides the landing-zone location implied by `system`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_path: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            system: SourceSystem::Wms,
            input_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub root: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_OUTPUT_ROOT.to_string(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_parquet_row_group_size")]
    pub parquet_row_group_size: usize,

    #[serde(default)]
    pub s3: S3Config,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            parquet_row_group_size: default_parquet_row_group_size(),
            s3: S3Config::default(),
        }
    }
}

fn default_parquet_row_group_size() -> usize {
    32 * 1024
}

/// Connection settings shared by every s3:// location of a run.
///
/// Credentials are resolved by the S3 client from the standard AWS
/// environment and never live in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from an explicit file (for the CLI --config flag)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse a TOML document, falling back to defaults for missing sections
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Input location, falling back to the landing zone of the source system
    pub fn input_path(&self) -> String {
        self.source
            .input_path
            .clone()
            .unwrap_or_else(|| self.source.system.default_input_path())
    }

    /// File format implied by the source system
    pub fn file_format(&self) -> FileFormat {
        self.source.system.file_format()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.source.system, SourceSystem::Wms);
        assert_eq!(config.input_path(), "s3://landing-zone/wms/");
        assert_eq!(config.file_format(), FileFormat::Json);
        assert_eq!(config.output.root, "s3://global-inventory");
        assert_eq!(config.storage.parquet_row_group_size, 32 * 1024);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_from_toml_str() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [source]
            system = "erp"

            [output]
            root = "/var/lib/bronze"

            [storage.s3]
            region = "eu-west-1"
            "#,
        )
        .unwrap();

        assert_eq!(config.source.system, SourceSystem::Erp);
        assert_eq!(config.input_path(), "s3://landing-zone/erp/");
        assert_eq!(config.file_format(), FileFormat::Parquet);
        assert_eq!(config.output.root, "/var/lib/bronze");
        assert_eq!(config.storage.s3.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_explicit_input_path_wins() {
        let mut config = RuntimeConfig::default();
        config.source.input_path = Some("/data/landing/wms".to_string());
        assert_eq!(config.input_path(), "/data/landing/wms");
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
