// Append-only Parquet table writer
//
// Serializes one partition's records to Parquet in memory, computing a
// Blake3 content hash while encoding, then uploads the bytes as a new data
// file under the partition directory. Existing files are never touched.
//
// A data file only becomes visible once complete. Backends that can rename
// (local filesystem) receive the bytes under the table's `_staging/`
// directory first and the finished file is renamed into its partition;
// object stores publish a PUT all at once and are written in place. Where
// the backend supports conditional writes, the no-overwrite rule is
// enforced by the store itself.

use std::io::{self, Write};

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use bronze_ingest_core::partition::BRONZE_DIR;
use bronze_ingest_core::{
    partition_dir, BatchId, PartitionKey, SourceSystem, StoreLocation, TaggedRecord,
};
use opendal::{Capability, ErrorKind, Operator};
use parquet::arrow::ArrowWriter;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::encoding::{writer_properties, DEFAULT_ROW_GROUP_SIZE};
use crate::record_batch::to_record_batch;
use crate::{Result, WriterError};

/// Directory under a table holding data files that are still being written.
pub const STAGING_DIR: &str = "_staging";

/// Where a source system's bronze table lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BronzeDestination {
    /// Output root, e.g. `s3://global-inventory`
    pub root: StoreLocation,
    pub source_system: SourceSystem,
}

impl BronzeDestination {
    pub fn new(root: StoreLocation, source_system: SourceSystem) -> Self {
        Self {
            root,
            source_system,
        }
    }

    /// Partition directory relative to the writer's storage root.
    pub fn partition_path(&self, partition: &PartitionKey) -> String {
        format!(
            "{}{}",
            self.root.prefix(),
            partition_dir(self.source_system, partition)
        )
    }

    /// Staging directory of the table relative to the storage root.
    pub fn staging_path(&self) -> String {
        format!("{}{}/", self.table_path(), STAGING_DIR)
    }

    /// Table directory (all partitions) relative to the storage root.
    pub fn table_path(&self) -> String {
        format!(
            "{}{}/{}/",
            self.root.prefix(),
            BRONZE_DIR,
            self.source_system
        )
    }

    /// Human-readable location of a path relative to the storage root.
    pub fn display(&self, path: &str) -> String {
        let relative = path.strip_prefix(self.root.prefix()).unwrap_or(path);
        self.root.display_path(relative)
    }
}

/// Outcome of appending one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionWrite {
    pub partition: PartitionKey,
    /// Fully qualified data file written
    pub file: String,
    pub rows: usize,
    pub malformed_rows: usize,
    pub bytes: usize,
    /// Blake3 hash of the file content, hex encoded
    pub content_hash: String,
}

/// Appends records to one partition of a bronze table.
#[async_trait]
pub trait TableWriter: Send + Sync {
    /// Append `records`, all of which carry `partition` as their key.
    ///
    /// Appending is purely additive: existing data in the partition is left
    /// intact and re-appending the same records stores them again.
    async fn append(
        &self,
        records: &[TaggedRecord],
        partition: &PartitionKey,
        destination: &BronzeDestination,
    ) -> Result<PartitionWrite>;
}

struct HashingBuffer {
    buffer: Vec<u8>,
    hasher: blake3::Hasher,
}

impl HashingBuffer {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            hasher: blake3::Hasher::new(),
        }
    }

    fn finish(self) -> (Vec<u8>, String) {
        let hash = self.hasher.finalize();
        (self.buffer, hex::encode(hash.as_bytes()))
    }
}

impl Write for HashingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parquet table writer over any OpenDAL operator
///
/// The operator is rooted like the reader's: at the bucket for S3, at the
/// output directory for the local filesystem.
#[derive(Clone)]
pub struct ParquetTableWriter {
    operator: Operator,
    row_group_size: usize,
    source_schema: Option<SchemaRef>,
}

impl ParquetTableWriter {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            source_schema: None,
        }
    }

    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size;
        self
    }

    /// Schema declared by the source files; matching raw columns are
    /// written with their declared types.
    pub fn with_source_schema(mut self, schema: Option<SchemaRef>) -> Self {
        self.source_schema = schema;
        self
    }

    /// Publish `buffer` at `path` without ever exposing a partial file.
    async fn commit(
        &self,
        buffer: Vec<u8>,
        path: &str,
        file: &str,
        destination: &BronzeDestination,
    ) -> Result<()> {
        let capability = self.operator.info().full_capability();
        if !capability.rename {
            return self.put(buffer, path, file, capability).await;
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);
        let staging = format!("{}{}", destination.staging_path(), file_name);
        self.put(buffer, &staging, file, capability).await?;

        let published = match self.operator.exists(path).await {
            Ok(false) => self.operator.rename(&staging, path).await.map_err(|e| {
                WriterError::write_failure(file, e)
            }),
            Ok(true) => Err(WriterError::object_exists(file)),
            Err(e) => Err(WriterError::write_failure(file, e)),
        };
        if published.is_err() {
            if let Err(e) = self.operator.delete(&staging).await {
                warn!(path = %destination.display(&staging), error = %e, "Failed to remove staged file");
            }
        }
        published
    }

    /// Write a new object, refusing to replace an existing one.
    async fn put(
        &self,
        buffer: Vec<u8>,
        path: &str,
        file: &str,
        capability: Capability,
    ) -> Result<()> {
        if capability.write_with_if_not_exists {
            return self
                .operator
                .write_with(path, buffer)
                .if_not_exists(true)
                .await
                .map(|_| ())
                .map_err(|e| match e.kind() {
                    ErrorKind::ConditionNotMatch => WriterError::object_exists(file),
                    _ => WriterError::write_failure(file, e),
                });
        }

        let exists = self
            .operator
            .exists(path)
            .await
            .map_err(|e| WriterError::write_failure(file, e))?;
        if exists {
            return Err(WriterError::object_exists(file));
        }
        self.operator
            .write(path, buffer)
            .await
            .map(|_| ())
            .map_err(|e| WriterError::write_failure(file, e))
    }

    fn encode(
        &self,
        batch: &RecordBatch,
        partition: &PartitionKey,
        source_system: SourceSystem,
        batch_id: BatchId,
    ) -> Result<(Vec<u8>, String)> {
        let encode_err =
            |e: parquet::errors::ParquetError| WriterError::encode(partition.to_string(), e);

        let mut sink = HashingBuffer::new();
        let props = writer_properties(self.row_group_size, source_system, batch_id);
        {
            let mut writer =
                ArrowWriter::try_new(&mut sink, batch.schema(), Some(props)).map_err(encode_err)?;
            writer.write(batch).map_err(encode_err)?;
            writer.close().map_err(encode_err)?;
        }
        Ok(sink.finish())
    }
}

#[async_trait]
impl TableWriter for ParquetTableWriter {
    async fn append(
        &self,
        records: &[TaggedRecord],
        partition: &PartitionKey,
        destination: &BronzeDestination,
    ) -> Result<PartitionWrite> {
        let Some(first) = records.first() else {
            return Err(WriterError::invalid_input(format!(
                "no records to append to partition {partition}"
            )));
        };
        if let Some(stray) = records.iter().find(|r| r.partition_key() != *partition) {
            return Err(WriterError::invalid_input(format!(
                "record keyed {} handed to partition {partition}",
                stray.partition_key()
            )));
        }
        let batch_id = first.envelope().batch_id();

        let batch = to_record_batch(records, self.source_schema.as_deref())?;
        let (buffer, content_hash) =
            self.encode(&batch, partition, destination.source_system, batch_id)?;
        let bytes = buffer.len();

        let path = format!(
            "{}part-{}-{}.parquet",
            destination.partition_path(partition),
            batch_id,
            Uuid::new_v4().simple()
        );
        let file = destination.display(&path);

        debug!(path = %file, rows = records.len(), bytes, "Uploading partition file");
        self.commit(buffer, &path, &file, destination).await?;

        let write = PartitionWrite {
            partition: *partition,
            file,
            rows: records.len(),
            malformed_rows: records.iter().filter(|r| r.payload().is_malformed()).count(),
            bytes,
            content_hash,
        };
        info!(
            partition = %write.partition,
            file = %write.file,
            rows = write.rows,
            bytes = write.bytes,
            hash = %write.content_hash,
            "Appended partition"
        );
        Ok(write)
    }
}
