//! Ingest session
//!
//! Scoped processing context of one run. Opening a session fixes the batch
//! identity and claims the run by writing an `_in_progress/{batch_id}`
//! marker next to the bronze table (also proving the output root is
//! writable); closing it removes the marker. [`IngestSession::ingest`]
//! guarantees the release on every path.

use arrow::datatypes::SchemaRef;
use bronze_ingest_core::{BatchId, Clock, SourceDescriptor, StoreLocation};
use bronze_ingest_reader::OpenDalReader;
use bronze_ingest_writer::{
    BronzeDestination, ParquetTableWriter, PartitionedAppendWriter, DEFAULT_ROW_GROUP_SIZE,
};
use chrono::Utc;
use opendal::Operator;
use serde_json::json;
use tracing::{error, info};

use crate::pipeline::{run_ingestion, RunReport};
use crate::IngestError;

const IN_PROGRESS_DIR: &str = "_in_progress";

pub struct IngestSession {
    batch_id: BatchId,
    source: SourceDescriptor,
    destination: BronzeDestination,
    input: Operator,
    output: Operator,
    row_group_size: usize,
    marker_path: String,
}

impl IngestSession {
    /// Acquire a session for ingesting `source` into the bronze layer under
    /// `output_root`.
    pub async fn open(
        source: SourceDescriptor,
        output_root: StoreLocation,
        input: Operator,
        output: Operator,
    ) -> Result<Self, IngestError> {
        let batch_id = BatchId::generate();
        let destination = BronzeDestination::new(output_root, source.source_system);
        let marker_path = format!(
            "{}{}/{}",
            destination.table_path(),
            IN_PROGRESS_DIR,
            batch_id
        );

        let marker = json!({
            "batch_id": batch_id,
            "source_system": source.source_system,
            "input": source.input.to_string(),
            "started_at": Utc::now().to_rfc3339(),
        });
        output
            .write(&marker_path, marker.to_string())
            .await
            .map_err(|e| {
                IngestError::storage(
                    destination.root.to_string(),
                    format!("output root is not writable: {}", e),
                )
            })?;

        info!(
            batch_id = %batch_id,
            source_system = %source.source_system,
            format = %source.format,
            input = %source.input,
            output = %destination.root,
            "Opened ingest session"
        );

        Ok(Self {
            batch_id,
            source,
            destination,
            input,
            output,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            marker_path,
        })
    }

    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size;
        self
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn destination(&self) -> &BronzeDestination {
        &self.destination
    }

    pub fn reader(&self) -> OpenDalReader {
        OpenDalReader::new(self.input.clone())
    }

    /// Writer for this session's table; `source_schema` is the schema the
    /// input files declared, if any.
    pub fn writer(
        &self,
        source_schema: Option<SchemaRef>,
    ) -> PartitionedAppendWriter<ParquetTableWriter> {
        PartitionedAppendWriter::new(
            ParquetTableWriter::new(self.output.clone())
                .with_row_group_size(self.row_group_size)
                .with_source_schema(source_schema),
        )
    }

    /// Run the pipeline, then release the session whatever the outcome.
    ///
    /// A release failure is logged and never replaces the run's own outcome:
    /// an aborted run keeps its original error, a completed run keeps its
    /// report.
    pub async fn ingest<C: Clock>(self, clock: C) -> Result<RunReport, IngestError> {
        let outcome = run_ingestion(&self, clock).await;
        let batch_id = self.batch_id;

        if let Err(teardown) = self.close().await {
            match &outcome {
                Err(original) => error!(
                    batch_id = %batch_id,
                    error = %original,
                    teardown_error = %teardown,
                    "Session release failed after an aborted run"
                ),
                Ok(_) => error!(
                    batch_id = %batch_id,
                    teardown_error = %teardown,
                    "Session release failed after the run completed"
                ),
            }
        }
        outcome
    }

    /// Release the session by removing its in-progress marker.
    pub async fn close(self) -> Result<(), IngestError> {
        self.output
            .delete(&self.marker_path)
            .await
            .map_err(|e| IngestError::Teardown {
                batch_id: self.batch_id,
                reason: e.to_string(),
            })?;
        info!(batch_id = %self.batch_id, "Closed ingest session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bronze_ingest_core::{FixedClock, SourceSystem};
    use chrono::TimeZone;
    use opendal::services;
    use std::path::{Path, PathBuf};

    /// Session reading an empty in-memory feed into a lake on local disk.
    async fn open_on_disk(lake: &Path) -> IngestSession {
        let input = Operator::new(services::Memory::default()).unwrap().finish();
        let output = Operator::new(services::Fs::default().root(lake.to_str().unwrap()))
            .unwrap()
            .finish();
        let source = SourceDescriptor::new(
            SourceSystem::Wms,
            StoreLocation::parse("memory://wms/").unwrap(),
        );
        let root = StoreLocation::parse(lake.to_str().unwrap()).unwrap();
        IngestSession::open(source, root, input, output).await.unwrap()
    }

    /// Replace the marker with a non-empty directory so it cannot be deleted.
    fn pin_marker(lake: &Path, batch_id: BatchId) -> PathBuf {
        let marker = lake
            .join("bronze/wms")
            .join(IN_PROGRESS_DIR)
            .join(batch_id.to_string());
        assert!(marker.is_file());
        std::fs::remove_file(&marker).unwrap();
        std::fs::create_dir_all(marker.join("pinned")).unwrap();
        marker
    }

    #[tokio::test]
    async fn test_close_reports_release_failure() {
        let lake = tempfile::tempdir().unwrap();
        let session = open_on_disk(lake.path()).await;
        let marker = pin_marker(lake.path(), session.batch_id());

        let err = session.close().await.unwrap_err();

        assert!(matches!(err, IngestError::Teardown { .. }), "unexpected error: {err}");
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_release_failure_does_not_mask_run_error() {
        let lake = tempfile::tempdir().unwrap();
        let session = open_on_disk(lake.path()).await;
        let marker = pin_marker(lake.path(), session.batch_id());
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap());

        let err = session.ingest(clock).await.unwrap_err();

        // The empty feed is the reported failure, not the stuck marker
        assert!(err.is_source_unavailable(), "unexpected error: {err}");
        assert!(marker.exists());
    }
}
