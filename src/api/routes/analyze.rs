//! Format discovery handler.

use super::AnalyzeQuery;
use crate::api::AppState;
use crate::error::Error;
use crate::types::MediaInfo;
use axum::{
    Json,
    extract::{Query, State},
};

/// GET /analyze - Discover title, duration and formats for a URL
#[utoipa::path(
    get,
    path = "/api/v1/analyze",
    tag = "downloads",
    params(AnalyzeQuery),
    responses(
        (status = 200, description = "Media information", body = crate::types::MediaInfo),
        (status = 400, description = "Invalid URL or the engine could not extract it", body = crate::error::ApiError),
        (status = 501, description = "No extraction engine available", body = crate::error::ApiError)
    )
)]
pub async fn analyze(
    State(state): State<AppState>,
    Query(query): Query<AnalyzeQuery>,
) -> Result<Json<MediaInfo>, Error> {
    let url = query
        .url
        .ok_or_else(|| Error::Validation("missing required query parameter: url".into()))?;

    let info = state.service.analyze(&url).await?;
    Ok(Json(info))
}
