//! REST API server module
//!
//! Exposes format discovery, task submission, status polling, file
//! retrieval and cancellation over HTTP, documented with OpenAPI.

use crate::{Config, MediaService, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{delete, get},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Downloads (under `/api/v1`)
/// - `GET /analyze?url=` - Discover available formats for a URL
/// - `POST /download` - Submit a download task
/// - `GET /download` - List all tasks
/// - `GET /download/status/:id` - Poll a task
/// - `GET /download/file/:id` - Fetch a completed task's file
/// - `DELETE /download/:id` - Cancel a task
///
/// ## System (under `/api/v1`)
/// - `GET /capabilities` - Engine capabilities
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /events` - Server-sent events stream
///
/// ## Root
/// - `GET /` - Welcome message
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(service: Arc<MediaService>, config: Arc<Config>) -> Router {
    let state = AppState::new(service, config.clone());

    let api = Router::new()
        // Downloads
        .route("/analyze", get(routes::analyze))
        .route(
            "/download",
            get(routes::list_downloads).post(routes::submit_download),
        )
        .route("/download/status/:id", get(routes::download_status))
        .route("/download/file/:id", get(routes::download_file))
        .route("/download/:id", delete(routes::cancel_download))
        // System
        .route("/capabilities", get(routes::get_capabilities))
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    let router = Router::new()
        .route("/", get(routes::welcome))
        .nest("/api/v1", api);

    // SwaggerUi serves its own copy of the document at the same URL the API exposes
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin; otherwise only the listed
/// origins are allowed. Methods and headers are unrestricted.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the server stops or the task driving it is aborted.
///
/// # Example
///
/// ```no_run
/// use mediasense::{Config, MediaService};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let service = Arc::new(MediaService::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// mediasense::api::start_api_server(service, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(service: Arc<MediaService>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(service, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
