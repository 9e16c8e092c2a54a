//! Partitioned append
//!
//! Groups tagged records by partition key and appends each group through a
//! [`TableWriter`]. Groups are written concurrently and independently: a
//! failed partition is reported alongside the ones that landed, and nothing
//! already written is rolled back.

use std::collections::BTreeMap;

use bronze_ingest_core::{PartitionKey, TaggedRecord};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::table_writer::{BronzeDestination, PartitionWrite, TableWriter};

/// A partition whose append did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionFailure {
    pub partition: PartitionKey,
    /// Partition directory that was targeted
    pub location: String,
    pub rows: usize,
    pub code: &'static str,
    pub error: String,
}

/// Per-partition outcome of one append call, ordered by partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub succeeded: Vec<PartitionWrite>,
    pub failed: Vec<PartitionFailure>,
}

impl WriteResult {
    /// True when every partition landed (vacuously true for empty input).
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn rows_written(&self) -> usize {
        self.succeeded.iter().map(|w| w.rows).sum()
    }

    /// Keys to retry.
    pub fn failed_partitions(&self) -> Vec<PartitionKey> {
        self.failed.iter().map(|f| f.partition).collect()
    }
}

/// Splits records by partition key and appends each partition.
pub struct PartitionedAppendWriter<W> {
    writer: W,
}

impl<W: TableWriter> PartitionedAppendWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Append `records` to the bronze table at `destination`.
    ///
    /// An empty input produces no writes and an empty, complete result.
    pub async fn append(
        &self,
        records: Vec<TaggedRecord>,
        destination: &BronzeDestination,
    ) -> WriteResult {
        let groups = group_by_partition(records);
        if groups.is_empty() {
            info!(source_system = %destination.source_system, "No records to append");
            return WriteResult::default();
        }

        let writes = groups.iter().map(|(partition, rows)| async move {
            let outcome = self.writer.append(rows, partition, destination).await;
            (*partition, rows.len(), outcome)
        });

        let mut result = WriteResult::default();
        for (partition, rows, outcome) in join_all(writes).await {
            match outcome {
                Ok(write) => result.succeeded.push(write),
                Err(e) => {
                    let location = destination.display(&destination.partition_path(&partition));
                    warn!(
                        partition = %partition,
                        location = %location,
                        rows,
                        error = %e,
                        "Partition append failed"
                    );
                    result.failed.push(PartitionFailure {
                        partition,
                        location,
                        rows,
                        code: e.code(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            source_system = %destination.source_system,
            partitions_written = result.succeeded.len(),
            partitions_failed = result.failed.len(),
            rows_written = result.rows_written(),
            "Append finished"
        );
        result
    }
}

/// Group records by key, preserving record order within each group.
pub fn group_by_partition(
    records: Vec<TaggedRecord>,
) -> BTreeMap<PartitionKey, Vec<TaggedRecord>> {
    let mut groups: BTreeMap<PartitionKey, Vec<TaggedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.partition_key()).or_default().push(record);
    }
    groups
}
