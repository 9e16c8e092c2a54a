//! JSON landing files
//!
//! Two layouts are accepted:
//! - newline-delimited: one object per line, blank lines ignored
//! - whole-file: a single (possibly pretty-printed) object, or an array of
//!   objects
//!
//! A leading UTF-8 byte order mark is ignored. A line that is not a JSON
//! object becomes a malformed record; the rest of the file is still read.

use bronze_ingest_core::MalformedRecord;
use serde_json::Value;

use crate::ParsedRecord;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn parse(bytes: &[u8]) -> Vec<ParsedRecord> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Vec::new();
    }

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| into_record(item, idx + 1))
            .collect(),
        Ok(value @ Value::Object(_)) => vec![into_record(value, 1)],
        // Anything else is either NDJSON or garbage; decide line by line.
        _ => parse_lines(bytes),
    }
}

fn parse_lines(bytes: &[u8]) -> Vec<ParsedRecord> {
    bytes
        .split(|b| *b == b'\n')
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                return None;
            }
            let line_no = idx + 1;
            Some(match serde_json::from_slice::<Value>(line) {
                Ok(value) => into_record(value, line_no),
                Err(e) => Err(MalformedRecord {
                    raw: String::from_utf8_lossy(line).into_owned(),
                    line: line_no,
                    reason: e.to_string(),
                }),
            })
        })
        .collect()
}

pub(crate) fn into_record(value: Value, line: usize) -> ParsedRecord {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MalformedRecord {
            raw: other.to_string(),
            line,
            reason: format!("expected a JSON object, found {}", kind(&other)),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
