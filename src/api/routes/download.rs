//! Download task handlers.

use super::{CancelResponse, parse_task_id};
use crate::api::AppState;
use crate::error::Error;
use crate::service::TaskFile;
use crate::storage::FileLease;
use crate::types::{SubmitRequest, SubmitResponse, TaskInfo, TaskStatus};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::ReaderStream;

/// POST /download - Submit a download task
#[utoipa::path(
    post,
    path = "/api/v1/download",
    tag = "downloads",
    request_body = crate::types::SubmitRequest,
    responses(
        (status = 201, description = "Task created", body = crate::types::SubmitResponse),
        (status = 400, description = "Invalid URL", body = crate::error::ApiError),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), Error> {
    let task_id = state
        .service
        .submit(&request.url, &request.format_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            task_id,
            status: TaskStatus::Pending,
        }),
    ))
}

/// GET /download - List all tasks
#[utoipa::path(
    get,
    path = "/api/v1/download",
    tag = "downloads",
    responses(
        (status = 200, description = "All known tasks, oldest first", body = Vec<crate::types::TaskInfo>)
    )
)]
pub async fn list_downloads(State(state): State<AppState>) -> Json<Vec<TaskInfo>> {
    Json(state.service.list().await)
}

/// GET /download/status/:id - Poll a task
#[utoipa::path(
    get,
    path = "/api/v1/download/status/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task snapshot", body = crate::types::TaskInfo),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn download_status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_task_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.status(id).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /download/file/:id - Stream a completed task's file
#[utoipa::path(
    get,
    path = "/api/v1/download/file/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown task, not completed, or file no longer available", body = crate::error::ApiError)
    )
)]
pub async fn download_file(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_task_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let TaskFile {
        file,
        filename,
        len,
        lease,
    } = match state.service.open_file(id).await {
        Ok(file) => file,
        Err(e) => return e.into_response(),
    };

    let disposition = match HeaderValue::from_str(&content_disposition(&filename)) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(task_id = %id, %filename, error = %e, "filename produces an invalid header");
            return Error::Other(format!("cannot serve file {filename}")).into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    tracing::debug!(task_id = %id, %filename, bytes = len, "serving file");

    let stream = LeasedStream {
        inner: ReaderStream::new(file),
        _lease: lease,
    };
    (headers, Body::from_stream(stream)).into_response()
}

/// DELETE /download/:id - Cancel a task
#[utoipa::path(
    delete,
    path = "/api/v1/download/{id}",
    tag = "downloads",
    params(
        ("id" = String, Path, description = "Task ID")
    ),
    responses(
        (status = 202, description = "Cancellation requested", body = CancelResponse),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task already completed or failed", body = crate::error::ApiError)
    )
)]
pub async fn cancel_download(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_task_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.service.cancel(id).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                task_id: id,
                status: "cancelling".into(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// File body stream that keeps the task's [`FileLease`] until the body is
/// dropped, so the janitor cannot reclaim the file mid-response.
struct LeasedStream<S> {
    inner: S,
    _lease: FileLease,
}

impl<S: Stream + Unpin> Stream for LeasedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
