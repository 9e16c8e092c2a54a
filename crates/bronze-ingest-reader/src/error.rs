//! Error types for the batch reader

use thiserror::Error;

/// Failures that make a source unreadable as a whole.
///
/// Content problems are never reported here, not even a file whose
/// container cannot be opened; they surface as malformed records instead.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Input location missing, unlisted or unreadable
    #[error("Source unavailable at '{location}': {reason}")]
    SourceUnavailable { location: String, reason: String },
}

impl ReaderError {
    pub fn source_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for ReaderError
pub type Result<T> = std::result::Result<T, ReaderError>;
