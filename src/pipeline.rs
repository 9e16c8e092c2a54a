//! One ingestion run: list -> read -> tag -> append.
//!
//! Every input file is read and tagged before the first partition write, so
//! an unavailable source aborts the run with nothing written. A file whose
//! content cannot be opened does not abort anything: it is forwarded as one
//! malformed record and reported.

use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use bronze_ingest_core::{BatchId, Clock, IngestionTagger, SourceSystem};
use bronze_ingest_reader::BatchReader;
use bronze_ingest_writer::{PartitionFailure, PartitionWrite};
use serde::Serialize;
use tracing::{info, warn};

use crate::session::IngestSession;
use crate::IngestError;

/// A record that could not be parsed; it was still written as a
/// `_corrupt_record` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedEntry {
    pub source_file: String,
    pub line: usize,
    pub reason: String,
}

/// Outcome of a run, printed as JSON by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub batch_id: BatchId,
    pub source_system: SourceSystem,
    pub input: String,
    pub output_root: String,
    pub files_read: usize,
    pub records_tagged: usize,
    pub malformed: Vec<MalformedEntry>,
    pub succeeded_partitions: Vec<PartitionWrite>,
    pub failed_partitions: Vec<PartitionFailure>,
    pub success: bool,
}

/// Ingest every file of the session's source into its bronze table.
///
/// `Err` means nothing was written. Partition failures do not produce an
/// error; they are listed in the report and clear `success`.
pub async fn run_ingestion<C: Clock>(
    session: &IngestSession,
    clock: C,
) -> Result<RunReport, IngestError> {
    let source = session.source();
    let reader = session.reader();
    let tagger = IngestionTagger::new(session.batch_id(), clock);

    let files = reader.list_files(&source.input).await?;

    let mut tagged = Vec::new();
    let mut malformed = Vec::new();
    let mut schemas = Vec::new();
    for file in &files {
        let source_file = reader.read_file(file, source.format).await?;
        schemas.extend(source_file.schema.clone());
        for bad in source_file.records.iter().filter_map(|r| r.as_ref().err()) {
            warn!(
                source_file = %source_file.uri,
                line = bad.line,
                reason = %bad.reason,
                "Malformed record forwarded as _corrupt_record"
            );
            malformed.push(MalformedEntry {
                source_file: source_file.uri.clone(),
                line: bad.line,
                reason: bad.reason.clone(),
            });
        }
        tagged.extend(tagger.tag(source_file.records, &source_file.uri));
    }

    let records_tagged = tagged.len();
    info!(
        batch_id = %session.batch_id(),
        files = files.len(),
        records = records_tagged,
        malformed = malformed.len(),
        "Tagged source records"
    );

    let result = session
        .writer(merge_schemas(schemas))
        .append(tagged, session.destination())
        .await;
    let success = result.is_complete();

    let report = RunReport {
        batch_id: session.batch_id(),
        source_system: source.source_system,
        input: source.input.to_string(),
        output_root: session.destination().root.to_string(),
        files_read: files.len(),
        records_tagged,
        malformed,
        succeeded_partitions: result.succeeded,
        failed_partitions: result.failed,
        success,
    };

    if success {
        info!(
            batch_id = %report.batch_id,
            partitions = report.succeeded_partitions.len(),
            "Ingestion run completed"
        );
    } else {
        warn!(
            batch_id = %report.batch_id,
            failed = report.failed_partitions.len(),
            succeeded = report.succeeded_partitions.len(),
            "Ingestion run completed with failed partitions"
        );
    }
    Ok(report)
}

/// One schema covering every file that declared one.
///
/// Files that disagree on a field's type leave the types to inference.
fn merge_schemas(schemas: Vec<SchemaRef>) -> Option<SchemaRef> {
    if schemas.is_empty() {
        return None;
    }
    let fields_only = schemas
        .iter()
        .map(|schema| Schema::new(schema.fields().clone()));
    match Schema::try_merge(fields_only) {
        Ok(merged) => Some(Arc::new(merged)),
        Err(e) => {
            warn!(error = %e, "Source files declare conflicting schemas; column types will be inferred");
            None
        }
    }
}
