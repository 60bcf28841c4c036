//! Error types for tasklens
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid task fields, bad config)
//! - 3: Rejected (missing task, duplicate user, bad credentials)
//! - 4: Operation failed (store, cache, I/O, cancelled request)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the tasklens CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasklens operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid task field: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Rejections (exit code 3)
    #[error("Task not found: {0}")]
    NotFound(i64),

    #[error("User already exists: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    Unauthorized,

    // Operation failures (exit code 4)
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Import aborted at row {index}: {reason}")]
    ImportFailure { index: usize, reason: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::Validation(_) | Error::InvalidConfig(_) | Error::InvalidArgument(_) => {
                exit_codes::USER_ERROR
            }

            // Rejections
            Error::NotFound(_) | Error::Conflict(_) | Error::Unauthorized => exit_codes::REJECTED,

            // Operation failures
            Error::Store(_)
            | Error::Cache(_)
            | Error::ImportFailure { .. }
            | Error::Cancelled
            | Error::DeadlineExceeded
            | Error::PasswordHash(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable name for the error class
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Unauthorized => "unauthorized",
            Error::Store(_) => "store",
            Error::Cache(_) => "cache",
            Error::ImportFailure { .. } => "import_failure",
            Error::Cancelled => "cancelled",
            Error::DeadlineExceeded => "deadline_exceeded",
            Error::PasswordHash(_) => "password_hash",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) => "toml",
            Error::LockFailed(_) => "lock_failed",
            Error::OperationFailed(_) => "operation_failed",
        }
    }

    /// Structured details for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::NotFound(id) => Some(serde_json::json!({ "id": id })),
            Error::Conflict(name) => Some(serde_json::json!({ "name": name })),
            Error::ImportFailure { index, reason } => {
                Some(serde_json::json!({ "index": index, "reason": reason }))
            }
            Error::Validation(message)
            | Error::InvalidConfig(message)
            | Error::InvalidArgument(message) => Some(serde_json::json!({ "message": message })),
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }

    /// Whether the error came from the caller giving up on the request
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

/// Result type alias for tasklens operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
