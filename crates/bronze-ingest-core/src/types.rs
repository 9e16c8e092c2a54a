//! Data model shared by the reader, tagger and writer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::location::StoreLocation;
use crate::partition::PartitionKey;

/// Field holding the raw text of a record that could not be parsed.
pub const CORRUPT_RECORD_FIELD: &str = "_corrupt_record";

/// One logical row/object as parsed from a source file.
///
/// No schema is imposed: field names and value types are whatever the
/// source file contained.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Upstream feed a run ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    Wms,
    Ecommerce,
    Erp,
}

impl SourceSystem {
    pub const ALL: [SourceSystem; 3] = [
        SourceSystem::Wms,
        SourceSystem::Ecommerce,
        SourceSystem::Erp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSystem::Wms => "wms",
            SourceSystem::Ecommerce => "ecommerce",
            SourceSystem::Erp => "erp",
        }
    }

    /// File format each feed delivers in.
    pub fn file_format(&self) -> FileFormat {
        match self {
            SourceSystem::Wms => FileFormat::Json,
            SourceSystem::Ecommerce => FileFormat::Csv,
            SourceSystem::Erp => FileFormat::Parquet,
        }
    }

    /// Landing-zone location used when no input path is configured.
    pub fn default_input_path(&self) -> String {
        format!("s3://landing-zone/{}/", self.as_str())
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unsupported source system: {0}. Supported: wms, ecommerce, erp")]
pub struct UnknownSourceSystem(pub String);

impl FromStr for SourceSystem {
    type Err = UnknownSourceSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wms" => Ok(SourceSystem::Wms),
            "ecommerce" => Ok(SourceSystem::Ecommerce),
            "erp" => Ok(SourceSystem::Erp),
            _ => Err(UnknownSourceSystem(s.to_string())),
        }
    }
}

/// On-disk format of a source feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of the feed ingested by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub source_system: SourceSystem,
    pub format: FileFormat,
    pub input: StoreLocation,
}

impl SourceDescriptor {
    /// Build a descriptor using the fixed system -> format mapping.
    pub fn new(source_system: SourceSystem, input: StoreLocation) -> Self {
        Self {
            source_system,
            format: source_system.file_format(),
            input,
        }
    }
}

/// Identity shared by every record ingested in one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Generate a fresh identity. Call once per run.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for BatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A record the reader could not turn into a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    /// Raw text of the offending row, lossily decoded.
    pub raw: String,
    /// 1-based line (or row) number within the source file; 0 when the
    /// file as a whole could not be opened.
    pub line: usize,
    pub reason: String,
}

/// Content of a tagged record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Parsed(RawRecord),
    Malformed(MalformedRecord),
}

impl RecordPayload {
    pub fn is_malformed(&self) -> bool {
        matches!(self, RecordPayload::Malformed(_))
    }

    /// Fields as they are written to storage.
    ///
    /// Malformed payloads become a single `_corrupt_record` text field.
    pub fn fields(&self) -> RawRecord {
        match self {
            RecordPayload::Parsed(record) => record.clone(),
            RecordPayload::Malformed(bad) => {
                let mut fields = RawRecord::new();
                fields.insert(
                    CORRUPT_RECORD_FIELD.to_string(),
                    serde_json::Value::String(bad.raw.clone()),
                );
                fields
            }
        }
    }
}

/// Provenance metadata attached once, at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionEnvelope {
    ingestion_timestamp: DateTime<Utc>,
    source_file: String,
    batch_id: BatchId,
}

impl IngestionEnvelope {
    pub(crate) fn new(
        ingestion_timestamp: DateTime<Utc>,
        source_file: impl Into<String>,
        batch_id: BatchId,
    ) -> Self {
        Self {
            ingestion_timestamp,
            source_file: source_file.into(),
            batch_id,
        }
    }

    pub fn ingestion_timestamp(&self) -> DateTime<Utc> {
        self.ingestion_timestamp
    }

    /// UTC calendar date of the ingestion timestamp.
    pub fn ingestion_date(&self) -> NaiveDate {
        self.ingestion_timestamp.date_naive()
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }
}

/// A raw record together with its envelope and partition key.
///
/// Envelope and key are private and set only by the tagger, so later stages
/// can read them but never recompute or overwrite them.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRecord {
    envelope: IngestionEnvelope,
    partition_key: PartitionKey,
    payload: RecordPayload,
}

impl TaggedRecord {
    pub(crate) fn new(envelope: IngestionEnvelope, payload: RecordPayload) -> Self {
        let partition_key = PartitionKey::from_timestamp(envelope.ingestion_timestamp());
        Self {
            envelope,
            partition_key,
            payload,
        }
    }

    pub fn envelope(&self) -> &IngestionEnvelope {
        &self.envelope
    }

    pub fn partition_key(&self) -> PartitionKey {
        self.partition_key
    }

    pub fn payload(&self) -> &RecordPayload {
        &self.payload
    }
}
