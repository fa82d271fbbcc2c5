//! Storage error types following internal error taxonomy
//!
//! Error codes:
//! - STORAGE_IO_ERROR (ERROR severity)
//! - STORAGE_WRITE_FAILED (ERROR severity)
//! - STORAGE_READ_FAILED (ERROR severity)
//! - DATA_CORRUPTION (FATAL severity) - from CORRUPTION category

use std::fmt;
use std::io;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, server continues
    Error,
    /// the process must terminate
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Disk I/O failure
    StorageIoError,
    /// Document write failed
    StorageWriteFailed,
    /// Document read failed
    StorageReadFailed,
    /// Data checksum failure (from CORRUPTION category)
    DataCorruption,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::StorageIoError => "STORAGE_IO_ERROR",
            StorageErrorCode::StorageWriteFailed => "STORAGE_WRITE_FAILED",
            StorageErrorCode::StorageReadFailed => "STORAGE_READ_FAILED",
            StorageErrorCode::DataCorruption => "DATA_CORRUPTION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::StorageIoError => Severity::Error,
            StorageErrorCode::StorageWriteFailed => Severity::Error,
            StorageErrorCode::StorageReadFailed => Severity::Error,
            StorageErrorCode::DataCorruption => Severity::Fatal,
        }
    }

    /// Returns the invariant violated by this error, if applicable
    pub fn invariant(&self) -> Option<&'static str> {
        match self {
            StorageErrorCode::StorageIoError => None,
            StorageErrorCode::StorageWriteFailed => Some("D1"),
            StorageErrorCode::StorageReadFailed => None,
            StorageErrorCode::DataCorruption => Some("D2"),
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Storage error type with full context
#[derive(Debug)]
pub struct StorageError {
    /// Error code
    code: StorageErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl StorageError {
    /// Create a new storage I/O error
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::StorageIoError,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a new storage write failed error
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::StorageWriteFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a storage write failed error without IO source
    pub fn write_failed_no_source(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::StorageWriteFailed,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a new storage read failed error
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: StorageErrorCode::StorageReadFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a new data corruption error (FATAL)
    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::DataCorruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create a data corruption error with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::DataCorruption,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    /// Create a data corruption error with document ID context
    pub fn corruption_for_document(document_id: &str, reason: impl Into<String>) -> Self {
        Self {
            code: StorageErrorCode::DataCorruption,
            message: reason.into(),
            details: Some(format!("document_id: {}", document_id)),
            source: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the invariant violated, if applicable
    pub fn invariant(&self) -> Option<&'static str> {
        self.code.invariant()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal (requires process termination)
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref invariant) = self.code.invariant() {
            write!(f, " [violates {}]", invariant)?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_spec() {
        assert_eq!(StorageErrorCode::StorageIoError.code(), "STORAGE_IO_ERROR");
        assert_eq!(StorageErrorCode::StorageWriteFailed.code(), "STORAGE_WRITE_FAILED");
        assert_eq!(StorageErrorCode::StorageReadFailed.code(), "STORAGE_READ_FAILED");
        assert_eq!(StorageErrorCode::DataCorruption.code(), "DATA_CORRUPTION");
    }

    #[test]
    fn test_severity_levels_match_spec() {
        assert_eq!(StorageErrorCode::StorageIoError.severity(), Severity::Error);
        assert_eq!(StorageErrorCode::StorageWriteFailed.severity(), Severity::Error);
        assert_eq!(StorageErrorCode::StorageReadFailed.severity(), Severity::Error);
        assert_eq!(StorageErrorCode::DataCorruption.severity(), Severity::Fatal);
    }

    #[test]
    fn test_data_corruption_is_fatal() {
        let err = StorageError::data_corruption("checksum mismatch");
        assert!(err.is_fatal());
        assert_eq!(err.code().code(), "DATA_CORRUPTION");
    }

    #[test]
    fn test_write_failed_not_fatal() {
        let err = StorageError::write_failed(
            "disk full",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_display_contains_required_fields() {
        let err = StorageError::corruption_at_offset(1024, "checksum mismatch");
        let display = format!("{}", err);
        assert!(display.contains("DATA_CORRUPTION"));
        assert!(display.contains("FATAL"));
        assert!(display.contains("checksum mismatch"));
        assert!(display.contains("byte_offset: 1024"));
        assert!(display.contains("D2"));
    }
}
