//! Pipeline-level errors

use bronze_ingest_core::{BatchId, LocationError};
use bronze_ingest_reader::ReaderError;
use thiserror::Error;

/// Errors that abort an ingestion run.
///
/// Per-partition write failures are not errors at this level: they are
/// reported in the run report so the caller can retry them.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The input could not be listed, read or opened. Raised before any
    /// partition is written.
    #[error(transparent)]
    Source(#[from] ReaderError),

    #[error("Invalid location '{location}': {source}")]
    Location {
        location: String,
        #[source]
        source: LocationError,
    },

    /// Output storage could not be set up or is not writable
    #[error("Storage unavailable at '{location}': {reason}")]
    Storage { location: String, reason: String },

    /// Releasing the session failed
    #[error("Failed to release ingest session {batch_id}: {reason}")]
    Teardown { batch_id: BatchId, reason: String },
}

impl IngestError {
    pub fn location(location: impl Into<String>, source: LocationError) -> Self {
        Self::Location {
            location: location.into(),
            source,
        }
    }

    pub fn storage(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::Storage {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the input feed itself is missing or unreadable.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, IngestError::Source(ReaderError::SourceUnavailable { .. }))
    }
}
