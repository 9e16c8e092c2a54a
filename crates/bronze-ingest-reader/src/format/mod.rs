//! Per-format parsers. All of them read values as-is:
//! - JSON: values keep their JSON types, no coercion
//! - CSV: header row required, every value is text
//! - Parquet: rows converted to JSON values, the embedded schema is returned
//!   alongside so the writer can restore the declared column types
//!
//! Parsing never fails as a whole. Content that cannot be opened at all
//! (a truncated Parquet footer, an unreadable CSV header) becomes a single
//! malformed record for the file.

pub mod csv;
pub mod json;
pub mod parquet;

use arrow::datatypes::SchemaRef;
use bronze_ingest_core::{FileFormat, MalformedRecord};
use bytes::Bytes;

use crate::ParsedRecord;

/// Longest prefix of an unopenable file kept as its `_corrupt_record`.
pub const CORRUPT_FILE_EXCERPT_BYTES: usize = 4096;

/// Records of one file, plus the schema the file declares (Parquet only).
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub records: Vec<ParsedRecord>,
    pub schema: Option<SchemaRef>,
}

impl ParsedFile {
    fn untyped(records: Vec<ParsedRecord>) -> Self {
        Self {
            records,
            schema: None,
        }
    }

    /// The whole file as one malformed record, at line 0.
    fn unreadable(bytes: &[u8], reason: impl ToString) -> Self {
        let excerpt = &bytes[..bytes.len().min(CORRUPT_FILE_EXCERPT_BYTES)];
        Self::untyped(vec![Err(MalformedRecord {
            raw: String::from_utf8_lossy(excerpt).into_owned(),
            line: 0,
            reason: reason.to_string(),
        })])
    }
}

/// Parse the full contents of one source file.
pub fn parse(format: FileFormat, path: &str, bytes: Bytes) -> ParsedFile {
    match format {
        FileFormat::Json => ParsedFile::untyped(json::parse(&bytes)),
        FileFormat::Csv => csv::parse(&bytes),
        FileFormat::Parquet => parquet::parse(path, bytes),
    }
}
