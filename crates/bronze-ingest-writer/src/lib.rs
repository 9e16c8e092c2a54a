// bronze-ingest-writer - Append-only bronze table writer
//
// Turns tagged records into Parquet data files laid out as
// `bronze/{source_system}/year=YYYY/month=MM/day=DD/part-{batch}-{id}.parquet`.
//
// Every append creates new files; nothing is compacted, replaced or
// deduplicated. Partitions are written independently so one failure never
// blocks the others.

mod encoding;
mod error;

pub mod append;
pub mod record_batch;
pub mod table_writer;

pub use append::{group_by_partition, PartitionFailure, PartitionedAppendWriter, WriteResult};
pub use encoding::DEFAULT_ROW_GROUP_SIZE;
pub use error::{ErrorCode, Result, WriterError};
pub use table_writer::{BronzeDestination, ParquetTableWriter, PartitionWrite, TableWriter};
