//! Parquet landing files
//!
//! Each row is converted to a JSON object through the row API, and the
//! file's embedded schema is returned with the rows so the declared column
//! types survive the trip to the bronze table. A file whose footer cannot
//! be opened becomes one malformed record; a row that fails to decode
//! becomes a malformed record pointing at the row.

use std::sync::Arc;

use bronze_ingest_core::MalformedRecord;
use bytes::Bytes;
use parquet::arrow::parquet_to_arrow_schema;
use parquet::file::reader::{FileReader, SerializedFileReader};
use tracing::warn;

use super::json::into_record;
use super::ParsedFile;

pub fn parse(path: &str, bytes: Bytes) -> ParsedFile {
    if bytes.is_empty() {
        return ParsedFile::default();
    }

    let reader = match SerializedFileReader::new(bytes.clone()) {
        Ok(reader) => reader,
        Err(e) => return ParsedFile::unreadable(&bytes, e),
    };

    let file_metadata = reader.metadata().file_metadata();
    let schema = match parquet_to_arrow_schema(
        file_metadata.schema_descr(),
        file_metadata.key_value_metadata(),
    ) {
        Ok(schema) => Some(Arc::new(schema)),
        Err(e) => {
            warn!(path, error = %e, "Parquet schema has no Arrow equivalent; column types will be inferred");
            None
        }
    };
    let expected_rows = usize::try_from(file_metadata.num_rows()).unwrap_or_default();

    let rows = match reader.get_row_iter(None) {
        Ok(rows) => rows,
        Err(e) => return ParsedFile::unreadable(&bytes, e),
    };

    let mut records = Vec::with_capacity(expected_rows);
    for (idx, row) in rows.enumerate() {
        let line = idx + 1;
        records.push(match row {
            Ok(row) => into_record(row.to_json_value(), line),
            // Binary rows have no text form; point at the row instead
            Err(e) => Err(MalformedRecord {
                raw: format!("{}#row={}", path, line),
                line,
                reason: e.to_string(),
            }),
        });
    }

    ParsedFile { records, schema }
}
