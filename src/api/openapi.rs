//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the mediasense REST API using
//! utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the mediasense REST API
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "mediasense REST API",
        version = "0.1.0",
        description = "Analyze media URLs, download them through a pluggable extraction engine, and fetch the stored files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        // Downloads
        crate::api::routes::analyze,
        crate::api::routes::submit_download,
        crate::api::routes::list_downloads,
        crate::api::routes::download_status,
        crate::api::routes::download_file,
        crate::api::routes::cancel_download,

        // System
        crate::api::routes::get_capabilities,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        crate::types::TaskId,
        crate::types::TaskStatus,
        crate::types::FailureKind,
        crate::types::TaskInfo,
        crate::types::FormatKind,
        crate::types::MediaFormat,
        crate::types::MediaInfo,
        crate::types::SubmitRequest,
        crate::types::SubmitResponse,
        crate::types::Capabilities,
        crate::types::Event,

        crate::api::routes::CancelResponse,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "downloads", description = "Format discovery, task submission, polling, file retrieval and cancellation"),
        (name = "system", description = "System endpoints - Health checks, capabilities, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
