//! Crate-wide error type for the query execution core.
//!
//! Follows the error-code idiom used throughout this codebase: a `Severity`
//! enum, a `*Code` enum exposing `.code()` / `.severity()`, and a struct
//! wrapping code + message + optional field. Every fallible public function
//! in `cursor`, `planner`, `racer`, `or_driver`, and `storage::capped`
//! returns `Result<T, CoreError>`.

use std::fmt;

use crate::storage::StorageError;

/// Severity of a `CoreError`, per the policy in the error handling design:
/// `RecoveryFailed`/`Killed`/`RefuseEmpty` are recoverable by the caller at
/// the next operation, `IntegrityError` is fatal and aborts the operation,
/// everything else is recoverable by switching plan or clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caller may retry, switch plan/clause, or otherwise continue.
    Recoverable,
    /// The current operation fails; the process keeps serving others.
    Error,
    /// An invariant was broken. The current operation must halt.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Recoverable => write!(f, "RECOVERABLE"),
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Core error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    /// The requested sort cannot be satisfied by any candidate plan and
    /// out-of-order iteration was not permitted.
    NoOrderedPlan,
    /// A capped allocation walked a full cycle of extents without finding
    /// a fit for the document.
    DocumentTooLarge,
    /// A cursor could not resume after `recover_from_yield` (capped
    /// overwrite of the current record, dropped namespace, dropped index).
    RecoveryFailed,
    /// The operation was asked to stop.
    Killed,
    /// An internal invariant was violated (capped pass counter exceeded,
    /// deleted-record chain not terminated). Fatal.
    IntegrityError,
    /// Truncation or deletion would remove the last live document in a
    /// capped namespace; the original asserts here rather than emptying.
    RefuseEmpty,
    /// Checksum or structural corruption surfaced while scanning storage.
    Corruption,
    /// Passthrough for non-fatal storage I/O failure.
    Io,
}

impl CoreErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            CoreErrorCode::NoOrderedPlan => "CORE_NO_ORDERED_PLAN",
            CoreErrorCode::DocumentTooLarge => "CORE_DOCUMENT_TOO_LARGE",
            CoreErrorCode::RecoveryFailed => "CORE_RECOVERY_FAILED",
            CoreErrorCode::Killed => "CORE_KILLED",
            CoreErrorCode::IntegrityError => "CORE_INTEGRITY_ERROR",
            CoreErrorCode::RefuseEmpty => "CORE_REFUSE_EMPTY",
            CoreErrorCode::Corruption => "CORE_DATA_CORRUPTION",
            CoreErrorCode::Io => "CORE_IO_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CoreErrorCode::NoOrderedPlan => Severity::Recoverable,
            CoreErrorCode::DocumentTooLarge => Severity::Error,
            CoreErrorCode::RecoveryFailed => Severity::Recoverable,
            CoreErrorCode::Killed => Severity::Recoverable,
            CoreErrorCode::IntegrityError => Severity::Fatal,
            CoreErrorCode::RefuseEmpty => Severity::Recoverable,
            CoreErrorCode::Corruption => Severity::Fatal,
            CoreErrorCode::Io => Severity::Error,
        }
    }
}

impl fmt::Display for CoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Crate-wide error with full context.
#[derive(Debug)]
pub struct CoreError {
    code: CoreErrorCode,
    message: String,
    /// Field or namespace the error concerns, when applicable.
    field: Option<String>,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), field: None }
    }

    pub fn with_field(code: CoreErrorCode, message: impl Into<String>, field: impl Into<String>) -> Self {
        Self { code, message: message.into(), field: Some(field.into()) }
    }

    pub fn no_ordered_plan(reason: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::NoOrderedPlan, reason)
    }

    pub fn document_too_large(len: usize) -> Self {
        Self::new(
            CoreErrorCode::DocumentTooLarge,
            format!("no free record of sufficient size for a {}-byte document", len),
        )
    }

    pub fn recovery_failed(reason: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::RecoveryFailed, reason)
    }

    pub fn killed() -> Self {
        Self::new(CoreErrorCode::Killed, "operation was killed")
    }

    pub fn integrity_error(reason: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::IntegrityError, reason)
    }

    pub fn refuse_empty(namespace: impl Into<String>) -> Self {
        Self::with_field(
            CoreErrorCode::RefuseEmpty,
            "truncation would remove the last live document",
            namespace,
        )
    }

    pub fn corruption(reason: impl Into<String>) -> Self {
        Self::new(CoreErrorCode::Corruption, reason)
    }

    pub fn code(&self) -> CoreErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Recoverable
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref field) = self.field {
            write!(f, " (field: {})", field)?;
        }
        Ok(())
    }
}

impl std::error::Error for CoreError {}

impl From<StorageError> for CoreError {
    fn from(e: StorageError) -> Self {
        if e.is_fatal() {
            CoreError::corruption(e.message().to_string())
        } else {
            CoreError::new(CoreErrorCode::Io, e.message().to_string())
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
