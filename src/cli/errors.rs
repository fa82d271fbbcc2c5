//! CLI-specific error types.

use std::fmt;
use std::io;

use crate::errors::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// The request JSON was malformed or missing a required field.
    BadRequest,
    /// stdin/stdout I/O failure.
    IoError,
    /// An engine-level failure (unknown namespace, plan exhaustion, ...).
    EngineError,
}

impl CliErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest => "CLI_BAD_REQUEST",
            Self::IoError => "CLI_IO_ERROR",
            Self::EngineError => "CLI_ENGINE_ERROR",
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BadRequest, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn engine_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::EngineError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        Self::engine_error(e.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;
