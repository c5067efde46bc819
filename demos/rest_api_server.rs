//! REST API server example
//!
//! Runs mediasense with the REST API, the janitor and graceful shutdown.
//!
//! Environment:
//! - `RUST_LOG` - log filter (default: `mediasense=info,tower_http=info`)
//! - `MEDIASENSE_BIND` - listen address (default: `127.0.0.1:8000`)
//! - `MEDIASENSE_BASE_DIR` - artifact directory (default: `./temp_downloads`)
//! - `COOKIES_CONTENT` - Netscape cookie file, raw or base64
//! - `MEDIASENSE_PROXY` - outbound proxy URL
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:8000/swagger-ui
//! - Analyze via GET http://localhost:8000/api/v1/analyze?url=...
//! - Submit via POST http://localhost:8000/api/v1/download
//! - Stream events via GET http://localhost:8000/api/v1/events

use mediasense::{Config, MediaService, run_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mediasense=info,tower_http=info")),
        )
        .init();

    let mut config = Config::default();
    if let Ok(bind) = std::env::var("MEDIASENSE_BIND") {
        config.api.bind_address = bind.parse()?;
    }
    if let Ok(dir) = std::env::var("MEDIASENSE_BASE_DIR") {
        config.storage.base_dir = dir.into();
    }
    config.engine.cookies = std::env::var("COOKIES_CONTENT").ok();
    config.engine.proxy = std::env::var("MEDIASENSE_PROXY").ok();

    let service = MediaService::new(config).await?;
    let address = service.get_config().api.bind_address;

    println!("Starting mediasense REST API server");
    println!("Swagger UI: http://{address}/swagger-ui");
    println!("API Base: http://{address}/api/v1");
    println!();
    println!("Example commands:");
    println!("  curl 'http://{address}/api/v1/analyze?url=https://www.youtube.com/watch?v=jNQXAC9IVRw'");
    println!("  curl -X POST http://{address}/api/v1/download \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"url\": \"https://www.youtube.com/watch?v=jNQXAC9IVRw\", \"format_id\": \"best\"}}'");
    println!("  curl -N http://{address}/api/v1/events");

    let janitor = service.start_janitor();
    let api = service.spawn_api_server();

    run_with_shutdown(service).await?;

    api.abort();
    janitor.await?;
    Ok(())
}
