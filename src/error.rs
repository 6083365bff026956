//! Error types for task
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, empty description)
//! - 3: Store busy (another process holds the database lock)
//! - 4: Operation failed (storage, decoding, I/O)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::Collection;

/// Exit codes for the task CLI
pub mod exit_codes {
    pub const USER_ERROR: i32 = 2;
    pub const STORE_BUSY: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for task operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Could not find the `{0}` collection")]
    CollectionNotFound(Collection),

    #[error("Task {id} does not exist in `{collection}`")]
    TaskNotFound { collection: Collection, id: u64 },

    #[error("Empty task description")]
    EmptyDescription,

    #[error("Invalid timestamp '{value}': {source}")]
    Parse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("No tasks exist")]
    NoTasks,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Store busy (exit code 3)
    #[error("Timed out waiting for the database lock: {0}")]
    LockTimeout(PathBuf),

    // Operation failures (exit code 4)
    #[error("Corrupt task record: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::CollectionNotFound(_)
            | Error::TaskNotFound { .. }
            | Error::EmptyDescription
            | Error::Parse { .. }
            | Error::NoTasks
            | Error::InvalidArgument(_)
            | Error::InvalidConfig(_) => exit_codes::USER_ERROR,

            Error::LockTimeout(_) => exit_codes::STORE_BUSY,

            // Operation failures
            Error::Decode(_)
            | Error::Storage(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// True for a missing collection or a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::CollectionNotFound(_) | Error::TaskNotFound { .. }
        )
    }

    /// Short machine-readable category for JSON output
    pub fn kind(&self) -> &'static str {
        if self.is_not_found() {
            return "not_found";
        }
        match self.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            exit_codes::STORE_BUSY => "store_busy",
            _ => "operation_failed",
        }
    }

    /// Structured details for the JSON error envelope
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::CollectionNotFound(collection) => {
                Some(serde_json::json!({ "collection": collection.name() }))
            }
            Error::TaskNotFound { collection, id } => Some(serde_json::json!({
                "collection": collection.name(),
                "id": id,
            })),
            Error::Parse { value, .. } => Some(serde_json::json!({ "value": value })),
            Error::LockTimeout(path) => {
                Some(serde_json::json!({ "lock": path.display().to_string() }))
            }
            _ => None,
        }
    }
}

impl From<sled::transaction::TransactionError<Error>> for Error {
    fn from(err: sled::transaction::TransactionError<Error>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(err) => err,
            sled::transaction::TransactionError::Storage(err) => Error::Storage(err),
        }
    }
}

/// Result type alias for task operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error body of the JSON envelope
#[derive(serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
