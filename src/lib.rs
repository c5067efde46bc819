//! # mediasense
//!
//! Asynchronous media download orchestration: analyze a media page URL,
//! submit a download, poll its progress and fetch the stored file.
//!
//! ## Design Philosophy
//!
//! mediasense is designed to be:
//! - **Non-blocking** - Submissions return a task ID immediately; work runs in detached jobs
//! - **Engine-agnostic** - Extraction sits behind the [`MediaEngine`] trait (yt-dlp by default)
//! - **Isolated** - Every task writes into its own directory, reclaimed after a retention window
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use mediasense::{Config, MediaService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = MediaService::new(Config::default()).await?;
//!
//!     let info = service.analyze("https://example.com/watch?v=abc").await?;
//!     println!("{} offers {} formats", info.title, info.formats.len());
//!
//!     let id = service.submit("https://example.com/watch?v=abc", "best").await?;
//!
//!     let mut events = service.subscribe();
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     println!("{:?}", service.status(id).await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Media extraction engines
pub mod engine;
/// Error types
pub mod error;
/// Expired artifact reclamation
pub mod janitor;
/// In-memory task registry
pub mod registry;
/// Core service implementation (decomposed into focused submodules)
pub mod service;
/// Per-task artifact storage
pub mod storage;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, Config, EngineConfig, JobConfig, StorageConfig};
pub use engine::{
    EngineCapabilities, MediaEngine, NoOpEngine, ProgressEvent, ProgressReporter,
    TransferRequest, YtDlpEngine,
};
pub use error::{
    ApiError, Error, ErrorDetail, ExtractionError, Result, StorageError, TaskError, ToHttpStatus,
};
pub use janitor::{Janitor, SweepReport};
pub use registry::{TaskRegistry, TaskUpdate};
pub use service::{MediaService, TaskFile};
pub use storage::{FileLease, StorageManager};
pub use types::{
    Capabilities, Event, FailureKind, FormatKind, FormatSelector, MediaFormat, MediaInfo,
    SubmitRequest, SubmitResponse, TaskId, TaskInfo, TaskStatus,
};

/// Run the service until a termination signal, then shut it down gracefully.
///
/// Returns early, without a second shutdown, when the service is shut down
/// through another handle first. Tasks still `pending` or `processing` when
/// the signal arrives end up `failed` as cancelled.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mediasense::{Config, MediaService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = MediaService::new(Config::default()).await?;
///     let _janitor = service.start_janitor();
///
///     run_with_shutdown(service).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: MediaService) -> Result<()> {
    tokio::select! {
        _ = wait_for_signal() => {}
        _ = service.jobs.background.cancelled() => {
            tracing::info!("Service already shut down");
            return Ok(());
        }
    }

    let unfinished = service
        .list()
        .await
        .iter()
        .filter(|task| !task.status.is_terminal())
        .count();
    tracing::info!(unfinished, "Stopping service");

    service.shutdown().await
}

async fn wait_for_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!("Received SIGINT signal (Ctrl+C)"),
        _ = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
