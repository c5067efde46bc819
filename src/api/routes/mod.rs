//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`analyze`] - Format discovery
//! - [`download`] - Task submission, polling, file retrieval, cancellation
//! - [`system`] - Welcome, health, capabilities, events, OpenAPI

use crate::error::ApiError;
use crate::types::TaskId;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

mod analyze;
mod download;
mod system;

pub use analyze::*;
pub use download::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /analyze
#[derive(Debug, Deserialize, Serialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnalyzeQuery {
    /// Media page URL to inspect
    pub url: Option<String>,
}

/// Response for DELETE /download/:id
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelResponse {
    /// Task that was signalled
    pub task_id: TaskId,
    /// Always `"cancelling"`; poll the status endpoint for the final state
    pub status: String,
}

/// Parse a task ID from a path segment
///
/// A malformed ID cannot name an existing task, so it is answered the same
/// way as an unknown one.
fn parse_task_id(raw: &str) -> Result<TaskId, Response> {
    raw.parse().map_err(|_| {
        let body = ApiError::new("task_not_found", format!("task {raw} not found"));
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    })
}
