// Initialization utilities for the ingestion binary
//
// Storage operators and logging/tracing setup

use std::path::Path;

use bronze_ingest_config::{LogConfig, LogFormat, S3Config};
use bronze_ingest_core::StoreLocation;
use bronze_ingest_reader::ReaderError;
use opendal::{services, Operator};
use tracing::info;

use crate::IngestError;

const DEFAULT_S3_REGION: &str = "us-east-1";

/// Build an operator addressing `location`.
///
/// S3 operators are rooted at the bucket and the location prefix is applied
/// per path; filesystem operators are rooted at the directory itself.
pub fn build_operator(location: &StoreLocation, s3: &S3Config) -> Result<Operator, IngestError> {
    let operator = match location {
        StoreLocation::Fs { path } => {
            info!("Using filesystem storage at: {}", path);
            Operator::new(services::Fs::default().root(path))
                .map_err(|e| IngestError::storage(location.to_string(), e))?
                .finish()
        }
        StoreLocation::S3 { bucket, .. } => {
            let region = s3.region.as_deref().unwrap_or(DEFAULT_S3_REGION);
            info!("Using S3 storage: bucket={}, region={}", bucket, region);

            let mut builder = services::S3::default().bucket(bucket).region(region);
            if let Some(endpoint) = &s3.endpoint {
                builder = builder.endpoint(endpoint);
            }
            Operator::new(builder)
                .map_err(|e| IngestError::storage(location.to_string(), e))?
                .finish()
        }
        StoreLocation::Memory { .. } => {
            info!("Using in-memory storage");
            Operator::new(services::Memory::default())
                .map_err(|e| IngestError::storage(location.to_string(), e))?
                .finish()
        }
    };
    Ok(operator)
}

/// Build the operator for an input feed.
///
/// A filesystem operator creates its root on demand, so a missing local input
/// directory is detected here rather than surfacing as an empty feed.
pub fn input_operator(location: &StoreLocation, s3: &S3Config) -> Result<Operator, IngestError> {
    if let StoreLocation::Fs { path } = location {
        if !Path::new(path).is_dir() {
            return Err(ReaderError::source_unavailable(
                location.to_string(),
                "input directory does not exist",
            )
            .into());
        }
    }
    build_operator(location, s3)
}

/// Initialize tracing/logging from the logging config
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries the run report
    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_local_input_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("landing").join("wms");
        let location = StoreLocation::parse(missing.to_str().unwrap()).unwrap();

        let err = input_operator(&location, &S3Config::default()).unwrap_err();

        assert!(err.is_source_unavailable());
        assert!(!missing.exists());
    }

    #[test]
    fn test_build_operators() {
        let dir = tempfile::tempdir().unwrap();
        let fs = StoreLocation::parse(dir.path().to_str().unwrap()).unwrap();
        assert!(input_operator(&fs, &S3Config::default()).is_ok());

        let s3 = StoreLocation::parse("s3://landing-zone/wms/").unwrap();
        let config = S3Config {
            region: Some("eu-west-1".to_string()),
            endpoint: Some("http://localhost:9000".to_string()),
        };
        assert!(build_operator(&s3, &config).is_ok());
    }
}
