// bronze-ingest - Lands raw source feeds into the bronze layer
//
// Reads every file of one source system's landing location, stamps each
// record with ingestion metadata and appends the records to date-partitioned,
// append-only Parquet tables:
//
//   {output_root}/bronze/{source_system}/year=YYYY/month=MM/day=DD/
//
// Partitions follow the day a record was ingested, never the business dates
// it carries; late-arriving data is reconciled downstream.

mod error;
mod init;
pub mod pipeline;
pub mod session;

pub use error::IngestError;
pub use init::{build_operator, init_tracing, input_operator};
pub use pipeline::{run_ingestion, MalformedEntry, RunReport};
pub use session::IngestSession;

use bronze_ingest_config::RuntimeConfig;
use bronze_ingest_core::{SourceDescriptor, StoreLocation};

/// Resolve the configured locations, build storage operators and open a
/// session for the configured source system.
pub async fn open_session(config: &RuntimeConfig) -> Result<IngestSession, IngestError> {
    let input_path = config.input_path();
    let input = StoreLocation::parse(&input_path)
        .map_err(|e| IngestError::location(input_path.clone(), e))?;
    let output_root = StoreLocation::parse(&config.output.root)
        .map_err(|e| IngestError::location(config.output.root.clone(), e))?;

    let source = SourceDescriptor::new(config.source.system, input);
    let input_op = input_operator(&source.input, &config.storage.s3)?;
    let output_op = build_operator(&output_root, &config.storage.s3)?;

    let session = IngestSession::open(source, output_root, input_op, output_op).await?;
    Ok(session.with_row_group_size(config.storage.parquet_row_group_size))
}
