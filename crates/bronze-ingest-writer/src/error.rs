//! Error types for the bronze writer crate

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Records could not be encoded to Parquet
    E001EncodeFailure,
    /// E002: Storage rejected or failed the write
    E002WriteFailure,
    /// E003: Target object already exists and would be overwritten
    E003ObjectExists,
    /// E004: Writer invoked with invalid input
    E004InvalidInput,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001EncodeFailure => "E001",
            Self::E002WriteFailure => "E002",
            Self::E003ObjectExists => "E003",
            Self::E004InvalidInput => "E004",
        }
    }
}

/// Errors that can occur while appending to a bronze partition
#[derive(Debug, Error)]
pub enum WriterError {
    /// Arrow/Parquet encoding failed
    #[error("[{code}] Failed to encode partition '{partition}': {reason}")]
    Encode {
        code: &'static str,
        partition: String,
        reason: String,
    },

    /// Storage write failed (transient or permanent)
    #[error("[{code}] Write to '{path}' failed: {reason}\n\nTroubleshooting:\n  • Verify the output root is reachable and writable\n  • Check storage credentials\n  • Re-run the job: other partitions of this run are unaffected")]
    WriteFailure {
        code: &'static str,
        path: String,
        reason: String,
    },

    /// Refused to overwrite an existing object
    #[error("[{code}] Refusing to overwrite existing object '{path}'; bronze partitions are append-only")]
    ObjectExists { code: &'static str, path: String },

    /// Invalid input to the writer
    #[error("[{code}] Invalid input: {message}")]
    InvalidInput { code: &'static str, message: String },
}

impl WriterError {
    pub fn encode(partition: impl Into<String>, reason: impl ToString) -> Self {
        Self::Encode {
            code: ErrorCode::E001EncodeFailure.as_str(),
            partition: partition.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E002WriteFailure.as_str(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn object_exists(path: impl Into<String>) -> Self {
        Self::ObjectExists {
            code: ErrorCode::E003ObjectExists.as_str(),
            path: path.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            code: ErrorCode::E004InvalidInput.as_str(),
            message: message.into(),
        }
    }

    /// Stable error code, e.g. "E002"
    pub fn code(&self) -> &'static str {
        match self {
            Self::Encode { code, .. }
            | Self::WriteFailure { code, .. }
            | Self::ObjectExists { code, .. }
            | Self::InvalidInput { code, .. } => code,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = WriterError::write_failure("bronze/wms/x.parquet", "connection reset");
        assert_eq!(err.code(), "E002");
        assert!(err.to_string().starts_with("[E002] Write to 'bronze/wms/x.parquet'"));

        let err = WriterError::object_exists("bronze/wms/x.parquet");
        assert_eq!(err.code(), "E003");
        assert!(err.to_string().contains("append-only"));
    }
}
