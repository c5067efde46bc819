//! Error types for mediasense
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Task, Storage, Extraction)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::types::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for mediasense operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mediasense
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.base_dir")
        key: Option<String>,
    },

    /// Malformed caller input, rejected before any task is created
    #[error("validation error: {0}")]
    Validation(String),

    /// Task lookup or state error
    #[error("{0}")]
    Task(#[from] TaskError),

    /// Storage directory error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Extraction engine could not discover or transfer media
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Task lookup and state errors
#[derive(Debug, Error)]
pub enum TaskError {
    /// No task with this ID exists
    #[error("task {id} not found")]
    NotFound {
        /// The task ID that was not found
        id: TaskId,
    },

    /// The task exists but its artifact is not ready yet
    #[error("task {id} is {status}, file not ready")]
    NotReady {
        /// The task ID
        id: TaskId,
        /// Current status
        status: TaskStatus,
    },

    /// The task completed but its artifact can no longer be served
    #[error("file for task {id} unavailable: {reason}")]
    FileUnavailable {
        /// The task ID
        id: TaskId,
        /// Why the file cannot be served (reclaimed, missing on disk)
        reason: String,
    },

    /// The task already reached a terminal status
    #[error("task {id} already {status}")]
    AlreadyFinished {
        /// The task ID
        id: TaskId,
        /// Terminal status
        status: TaskStatus,
    },
}

/// Storage directory errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Could not create the task directory
    #[error("failed to allocate {path} for task {id}: {reason}")]
    AllocateFailed {
        /// Task the directory belongs to
        id: TaskId,
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// Could not create the base directory
    #[error("failed to create base directory {path}: {reason}")]
    BaseDirFailed {
        /// Base directory path
        path: PathBuf,
        /// Underlying error
        reason: String,
    },
}

/// Extraction engine errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Format discovery failed
    #[error("failed to extract media info: {0}")]
    DiscoverFailed(String),

    /// Transfer failed
    #[error("download failed: {0}")]
    TransferFailed(String),

    /// The engine finished without reporting a usable output file
    #[error("engine produced no output file in {dir}")]
    NoOutput {
        /// Task output directory
        dir: PathBuf,
    },

    /// The engine reported a file outside the task directory
    #[error("engine reported {path} outside of {dir}")]
    OutsideTaskDir {
        /// Reported path
        path: PathBuf,
        /// Task output directory
        dir: PathBuf,
    },

    /// Transfer aborted because the task was cancelled
    #[error("download cancelled")]
    Cancelled,

    /// Transfer exceeded the maximum task duration
    #[error("download exceeded maximum duration of {secs}s")]
    TimedOut {
        /// Configured limit in seconds
        secs: u64,
    },
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "task_not_found",
///     "message": "task 1b4e28ba-2fa1-11d2-883f-0016d3cca427 not found",
///     "details": {
///       "task_id": "1b4e28ba-2fa1-11d2-883f-0016d3cca427"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "task_not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            // Discovery errors are surfaced synchronously and blamed on the URL
            Error::Extraction(ExtractionError::DiscoverFailed(_)) => 400,

            // 404 Not Found
            Error::Task(TaskError::NotFound { .. }) => 404,
            Error::Task(TaskError::NotReady { .. }) => 404,
            Error::Task(TaskError::FileUnavailable { .. }) => 404,

            // 409 Conflict
            Error::Task(TaskError::AlreadyFinished { .. }) => 409,

            // 422 Unprocessable Entity
            Error::Extraction(_) => 422,

            // 500 Internal Server Error
            Error::Storage(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            // 501 Not Implemented
            Error::NotSupported(_) => 501,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::Task(e) => match e {
                TaskError::NotFound { .. } => "task_not_found",
                TaskError::NotReady { .. } => "file_not_ready",
                TaskError::FileUnavailable { .. } => "file_unavailable",
                TaskError::AlreadyFinished { .. } => "already_finished",
            },
            Error::Storage(_) => "storage_error",
            Error::Extraction(e) => match e {
                ExtractionError::DiscoverFailed(_) => "extraction_failed",
                ExtractionError::TransferFailed(_) => "transfer_failed",
                ExtractionError::NoOutput { .. } => "no_output",
                ExtractionError::OutsideTaskDir { .. } => "no_output",
                ExtractionError::Cancelled => "cancelled",
                ExtractionError::TimedOut { .. } => "timed_out",
            },
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            Error::Task(TaskError::NotFound { id }) => Some(serde_json::json!({
                "task_id": id,
            })),
            Error::Task(TaskError::NotReady { id, status }) => Some(serde_json::json!({
                "task_id": id,
                "status": status,
            })),
            Error::Task(TaskError::FileUnavailable { id, reason }) => Some(serde_json::json!({
                "task_id": id,
                "reason": reason,
            })),
            Error::Task(TaskError::AlreadyFinished { id, status }) => Some(serde_json::json!({
                "task_id": id,
                "status": status,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
