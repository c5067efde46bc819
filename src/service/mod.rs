//! Media service implementation split into focused submodules.
//!
//! The `MediaService` struct and its methods are organized by domain:
//! - [`submit`] - URL validation, format discovery and task submission
//! - [`control`] - Status, listing, cancellation and file access
//! - [`lifecycle`] - Shutdown coordination
//! - [`services`] - Background service starters (janitor, API server)
//! - [`executor`] - Per-task job execution and progress bridging

mod control;
mod executor;
mod lifecycle;
mod services;
mod submit;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::TaskFile;
pub use submit::validate_url;

use crate::config::Config;
use crate::engine::{MediaEngine, NoOpEngine, YtDlpEngine};
use crate::error::Result;
use crate::registry::TaskRegistry;
use crate::storage::StorageManager;
use crate::types::{Capabilities, Event, TaskId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// Job scheduling state
#[derive(Clone)]
pub(crate) struct JobState {
    /// Semaphore limiting concurrent transfers (respects max_concurrent_jobs)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Non-terminal jobs and their cancellation tokens
    pub(crate) active_jobs: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    /// Whether new submissions are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Cancels background services such as the janitor
    pub(crate) background: CancellationToken,
}

/// Main service instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MediaService {
    /// Task registry (public for integration tests to inspect task state)
    pub registry: Arc<TaskRegistry>,
    /// Per-task artifact storage
    pub(crate) storage: Arc<StorageManager>,
    /// Extraction engine (trait object for pluggable implementations)
    pub(crate) engine: Arc<dyn MediaEngine>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Job scheduling state
    pub(crate) jobs: JobState,
}

impl MediaService {
    /// Create a new MediaService, selecting the engine from configuration
    ///
    /// An explicitly configured yt-dlp path wins; otherwise PATH is searched
    /// (unless disabled), and without a binary the service falls back to
    /// [`NoOpEngine`] so the API still starts.
    pub async fn new(config: Config) -> Result<Self> {
        let engine: Arc<dyn MediaEngine> = if let Some(ref path) = config.engine.ytdlp_path {
            Arc::new(configure_ytdlp(YtDlpEngine::new(path.clone()), &config))
        } else if config.engine.search_path {
            YtDlpEngine::from_path()
                .map(|e| Arc::new(configure_ytdlp(e, &config)) as Arc<dyn MediaEngine>)
                .unwrap_or_else(|| Arc::new(NoOpEngine))
        } else {
            Arc::new(NoOpEngine)
        };

        Self::with_engine(config, engine).await
    }

    /// Create a MediaService around a specific engine
    pub async fn with_engine(config: Config, engine: Arc<dyn MediaEngine>) -> Result<Self> {
        config.validate()?;

        let base_dir = std::path::absolute(&config.storage.base_dir)?;
        let storage = Arc::new(StorageManager::new(base_dir));
        storage.init().await?;

        let caps = engine.capabilities();
        tracing::info!(
            engine = engine.name(),
            can_discover = caps.can_discover,
            can_transfer = caps.can_transfer,
            base_dir = ?storage.base_dir(),
            "Media engine initialized"
        );

        // Buffer of 1000 events per subscriber before it starts lagging
        let (event_tx, _rx) = broadcast::channel(1000);

        let jobs = JobState {
            concurrent_limit: Arc::new(Semaphore::new(config.jobs.max_concurrent_jobs)),
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            background: CancellationToken::new(),
        };

        Ok(Self {
            registry: Arc::new(TaskRegistry::new()),
            storage,
            engine,
            event_tx,
            config: Arc::new(config),
            jobs,
        })
    }

    /// Subscribe to task events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mediasense::{Config, MediaService};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let service = MediaService::new(Config::default()).await?;
    ///
    ///     let mut events = service.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             tracing::info!(?event, "task event");
    ///         }
    ///     });
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Artifact storage manager
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Query the engine's capabilities
    pub fn capabilities(&self) -> Capabilities {
        let caps = self.engine.capabilities();
        Capabilities {
            engine: self.engine.name().to_string(),
            can_discover: caps.can_discover,
            can_transfer: caps.can_transfer,
        }
    }

    /// Emit an event to all subscribers
    ///
    /// Without subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

fn configure_ytdlp(engine: YtDlpEngine, config: &Config) -> YtDlpEngine {
    engine
        .with_socket_timeout(config.engine.socket_timeout)
        .with_network(config.engine.cookie_file_contents(), config.engine.proxy.clone())
}
