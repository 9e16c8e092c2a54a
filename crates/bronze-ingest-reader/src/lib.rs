//! Batch reader for landing-zone files
//!
//! Turns a directory of source files into untyped records without imposing a
//! schema. Rows that cannot be represented as a mapping are returned as
//! [`MalformedRecord`]s next to the good ones so one corrupt row never aborts
//! its file, and one unopenable file never aborts the batch.

mod error;
pub mod format;
mod reader;

pub use error::{ReaderError, Result};
pub use reader::{BatchReader, OpenDalReader, SourceFile, SourceFileRef};

use bronze_ingest_core::{MalformedRecord, RawRecord};

/// Outcome of parsing one row/object.
pub type ParsedRecord = std::result::Result<RawRecord, MalformedRecord>;
