//! Partition key derivation and Hive-style partition paths
//!
//! Layout: `bronze/{source_system}/year={YYYY}/month={MM}/day={DD}/`
//!
//! The key is a pure function of the ingestion timestamp, decomposed in UTC.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::fmt;

use crate::types::SourceSystem;

/// Top-level directory of the bronze layer under the output root.
pub const BRONZE_DIR: &str = "bronze";

/// Calendar day a record was ingested on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PartitionKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl PartitionKey {
    /// Decompose an ingestion timestamp into its UTC calendar day.
    pub fn from_timestamp(ingestion_timestamp: DateTime<Utc>) -> Self {
        Self {
            year: ingestion_timestamp.year(),
            month: ingestion_timestamp.month(),
            day: ingestion_timestamp.day(),
        }
    }

    /// Relative path segment, e.g. `year=2024/month=03/day=02`
    pub fn hive_path(&self) -> String {
        format!(
            "year={:04}/month={:02}/day={:02}",
            self.year, self.month, self.day
        )
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hive_path())
    }
}

/// Directory of a bronze partition relative to the output root.
///
/// Always ends with `/`.
pub fn partition_dir(source_system: SourceSystem, key: &PartitionKey) -> String {
    format!(
        "{}/{}/{}/",
        BRONZE_DIR,
        source_system.as_str(),
        key.hive_path()
    )
}
