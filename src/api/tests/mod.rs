use super::*;
use crate::service::test_helpers::{Script, create_test_service, create_test_service_with_config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


/// Router over a scripted-engine service; keep the TempDir alive for the test
async fn create_test_app(script: Script) -> (Router, Arc<MediaService>, TempDir) {
    let (service, _engine, temp_dir) = create_test_service(script).await;
    let service = Arc::new(service);
    let config = service.get_config();
    (create_router(service.clone(), config), service, temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn get(app: &Router, uri: &str) -> axum::response::Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn api_server_spawns_on_free_port() {
    let (service, _engine, _temp_dir) = create_test_service(Script::complete("clip.mp4")).await;
    let service = Arc::new(service);

    let mut config = (*service.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let service = service.clone();
        let config = config.clone();
        async move { start_api_server(service, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished(), "server exited early");
    api_handle.abort();
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let (service, _engine, _temp_dir) = create_test_service(Script::complete("clip.mp4")).await;
    let service = Arc::new(service);

    let mut config = (*service.get_config()).clone();
    config.api.cors_enabled = true;
    config.api.cors_origins = vec!["*".to_string()];
    let app = create_router(service, Arc::new(config));

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_allows_only_listed_origins() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = crate::service::test_helpers::test_config(&temp);
    config.api.cors_origins = vec!["http://localhost:3000".to_string()];
    let (service, _engine, _temp) =
        create_test_service_with_config(Script::complete("clip.mp4"), config, temp).await;
    let service = Arc::new(service);
    let app = create_router(service.clone(), service.get_config());

    let allowed = send(
        &app,
        Request::builder()
            .uri("/api/v1/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    let denied = send(
        &app,
        Request::builder()
            .uri("/api/v1/health")
            .header("Origin", "http://evil.test")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert!(
        !denied
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn swagger_ui_can_be_disabled() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = crate::service::test_helpers::test_config(&temp);
    config.api.swagger_ui = false;
    let (service, _engine, _temp) =
        create_test_service_with_config(Script::complete("clip.mp4"), config, temp).await;
    let service = Arc::new(service);
    let app = create_router(service.clone(), service.get_config());

    let response = get(&app, "/swagger-ui").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The JSON document itself stays available
    let response = get(&app, "/api/v1/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _service, _temp) = create_test_app(Script::complete("clip.mp4")).await;
    let response = get(&app, "/api/v1/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
