//! CSV landing files
//!
//! The first row is the header. No type inference: every value is kept as
//! text. Column names that are blank become `_c{index}` and repeated names
//! get their index appended so no value is ever shadowed.

use bronze_ingest_core::{MalformedRecord, RawRecord};
use serde_json::Value;
use std::collections::HashSet;

use super::ParsedFile;
use crate::ParsedRecord;

pub fn parse(bytes: &[u8]) -> ParsedFile {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns = match reader.byte_headers() {
        Ok(headers) => column_names(headers),
        Err(e) => return ParsedFile::unreadable(bytes, e),
    };

    let mut records = Vec::new();
    let mut row = ::csv::ByteRecord::new();
    loop {
        let start = reader.position().byte();
        let outcome = reader.read_byte_record(&mut row);
        let end = reader.position().byte();
        // Quarantined rows keep their exact source text, quoting included
        let raw = || raw_text(bytes, start, end);

        // Header is line 1
        let fallback_line = records.len() + 2;
        let line = row
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        match outcome {
            Ok(true) => records.push(into_record(&columns, &row, line, raw)),
            Ok(false) => break,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(line);
                records.push(Err(MalformedRecord {
                    raw: raw(),
                    line,
                    reason: e.to_string(),
                }));
                if end == start {
                    break;
                }
            }
        }
    }

    ParsedFile::untyped(records)
}

fn raw_text(bytes: &[u8], start: u64, end: u64) -> String {
    let start = usize::try_from(start).unwrap_or(bytes.len()).min(bytes.len());
    let end = usize::try_from(end).unwrap_or(bytes.len()).clamp(start, bytes.len());
    let text = String::from_utf8_lossy(&bytes[start..end]);
    text.trim_matches(|c| c == '\r' || c == '\n').to_string()
}

fn column_names(headers: &::csv::ByteRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let name = String::from_utf8_lossy(raw).trim().to_string();
            let name = if name.is_empty() {
                format!("_c{}", idx)
            } else {
                name
            };
            if seen.insert(name.clone()) {
                name
            } else {
                let renamed = format!("{}{}", name, idx);
                seen.insert(renamed.clone());
                renamed
            }
        })
        .collect()
}

fn into_record(
    columns: &[String],
    row: &::csv::ByteRecord,
    line: usize,
    raw_line: impl Fn() -> String,
) -> ParsedRecord {
    if row.len() != columns.len() {
        return Err(MalformedRecord {
            raw: raw_line(),
            line,
            reason: format!(
                "expected {} fields, found {}",
                columns.len(),
                row.len()
            ),
        });
    }

    let mut record = RawRecord::new();
    for (column, field) in columns.iter().zip(row.iter()) {
        match std::str::from_utf8(field) {
            Ok(text) => {
                record.insert(column.clone(), Value::String(text.to_string()));
            }
            Err(e) => {
                return Err(MalformedRecord {
                    raw: raw_line(),
                    line,
                    reason: format!("column '{}' is not valid UTF-8: {}", column, e),
                });
            }
        }
    }
    Ok(record)
}
