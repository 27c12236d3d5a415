//! Engine error types
//!
//! Error codes:
//! - CHUNKQL_MALFORMED_INPUT (FATAL): input could not be tokenized
//! - CHUNKQL_UNKNOWN_COLUMN (ERROR): operator references a missing column
//! - CHUNKQL_RESOURCE (FATAL): spill storage write/read/delete failure
//! - CHUNKQL_INVALID_OPERATION (ERROR): operator used out of order or misconfigured
//! - CHUNKQL_CONFIG (ERROR): configuration rejected
//!
//! Type coercion failures are never errors. They fall back silently and are
//! reported only as a trace-level observability signal.

use std::fmt;
use std::io;

use crate::codec::CodecError;

/// Severity levels for engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The pipeline was aborted but the process is healthy
    Error,
    /// Input or storage is unusable; the whole read/sort is abandoned
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

/// Engine error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Raw record structure could not be tokenized
    MalformedInput,
    /// Operator referenced a column absent from the headers
    UnknownColumn,
    /// Temporary run storage failed
    Resource,
    /// Operator misuse (e.g. probing a join before building it)
    InvalidOperation,
    /// Configuration rejected at load time
    Config,
}

impl ErrorCode {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::MalformedInput => "CHUNKQL_MALFORMED_INPUT",
            ErrorCode::UnknownColumn => "CHUNKQL_UNKNOWN_COLUMN",
            ErrorCode::Resource => "CHUNKQL_RESOURCE",
            ErrorCode::InvalidOperation => "CHUNKQL_INVALID_OPERATION",
            ErrorCode::Config => "CHUNKQL_CONFIG",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::MalformedInput | ErrorCode::Resource => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Engine error with full context
#[derive(Debug)]
pub struct EngineError {
    code: ErrorCode,
    message: String,
    /// Column name for UnknownColumn errors
    column: Option<String>,
    source: Option<io::Error>,
}

impl EngineError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            column: None,
            source: None,
        }
    }

    /// Create a malformed input error
    pub fn malformed_input(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedInput, reason)
    }

    /// Create an unknown column error
    pub fn unknown_column(column: impl Into<String>, available: &[String]) -> Self {
        let column = column.into();
        let mut err = Self::new(
            ErrorCode::UnknownColumn,
            format!(
                "Column '{}' not found. Available columns: [{}]",
                column,
                available.join(", ")
            ),
        );
        err.column = Some(column);
        err
    }

    /// Create a resource error wrapping the underlying I/O failure
    pub fn resource(reason: impl Into<String>, source: io::Error) -> Self {
        let mut err = Self::new(ErrorCode::Resource, reason);
        err.source = Some(source);
        err
    }

    /// Create a resource error without an I/O source (e.g. checksum mismatch)
    pub fn resource_corrupt(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Resource, reason)
    }

    /// Create an invalid operation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOperation, reason)
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, reason)
    }

    /// Returns the error code
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending column for UnknownColumn errors
    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<CodecError> for EngineError {
    fn from(e: CodecError) -> Self {
        Self::malformed_input(e.to_string())
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
