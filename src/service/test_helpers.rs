//! Shared test helpers for creating MediaService instances in tests.

use crate::config::Config;
use crate::engine::{
    EngineCapabilities, MediaEngine, ProgressEvent, ProgressReporter, TransferRequest,
};
use crate::error::{Error, ExtractionError};
use crate::service::MediaService;
use crate::types::{FormatKind, MediaFormat, MediaInfo, TaskId, TaskInfo};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// What a [`ScriptedEngine`] does when asked to transfer
#[derive(Clone, Debug)]
pub(crate) enum Script {
    /// Report `events`, wait `delay`, then write `filename` into the output dir
    Complete {
        events: Vec<ProgressEvent>,
        filename: String,
        delay: Duration,
    },
    /// Report `events`, then fail with a transfer error
    Fail {
        events: Vec<ProgressEvent>,
        message: String,
    },
    /// Leave a partial file behind and wait until cancelled
    Hang,
    /// Never return, ignoring cancellation
    Stall,
    /// Claim success with a file outside the output directory
    Escape,
}

impl Script {
    pub(crate) fn complete(filename: &str) -> Self {
        Script::Complete {
            events: vec![
                ProgressEvent::Downloading {
                    percent: "10.0%".into(),
                },
                ProgressEvent::Downloading {
                    percent: " 55.5%".into(),
                },
                ProgressEvent::Finished,
            ],
            filename: filename.to_string(),
            delay: Duration::ZERO,
        }
    }
}

/// Engine double driven by a [`Script`]
pub(crate) struct ScriptedEngine {
    script: Script,
    pub(crate) transfers: AtomicUsize,
    running: AtomicUsize,
    pub(crate) max_running: AtomicUsize,
}

impl ScriptedEngine {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            transfers: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(crate) fn sample_info() -> MediaInfo {
    MediaInfo {
        title: "Sample clip".into(),
        thumbnail: Some("https://example.test/thumb.jpg".into()),
        duration: "1:05".into(),
        platform: Some("Generic".into()),
        formats: vec![
            MediaFormat {
                resolution: "Best Quality".into(),
                ext: "mp4".into(),
                size: "Variable".into(),
                format_id: "best".into(),
                kind: FormatKind::Best,
            },
            MediaFormat {
                resolution: "720p".into(),
                ext: "mp4".into(),
                size: "12.0 MB".into(),
                format_id: "22".into(),
                kind: FormatKind::Video,
            },
        ],
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn discover(&self, url: &str) -> crate::Result<MediaInfo> {
        if url.contains("unsupported") {
            return Err(ExtractionError::DiscoverFailed(format!("Unsupported URL: {url}")).into());
        }
        Ok(sample_info())
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        reporter: ProgressReporter,
    ) -> crate::Result<PathBuf> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        match &self.script {
            Script::Complete {
                events,
                filename,
                delay,
            } => {
                for event in events {
                    if reporter.report(event.clone()).is_break() {
                        return Err(ExtractionError::Cancelled.into());
                    }
                }
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => {}
                    _ = reporter.cancelled() => return Err(ExtractionError::Cancelled.into()),
                }
                let path = request.output_dir.join(filename);
                tokio::fs::write(&path, b"fake media payload").await?;
                Ok(path)
            }
            Script::Fail { events, message } => {
                for event in events {
                    let _ = reporter.report(event.clone());
                }
                Err(ExtractionError::TransferFailed(message.clone()).into())
            }
            Script::Hang => {
                tokio::fs::write(request.output_dir.join("clip.mp4.part"), b"partial").await?;
                reporter.cancelled().await;
                Err(ExtractionError::Cancelled.into())
            }
            Script::Stall => {
                tokio::fs::write(request.output_dir.join("clip.mp4.part"), b"partial").await?;
                std::future::pending::<()>().await;
                Err(Error::Other("unreachable".into()))
            }
            Script::Escape => {
                let outside = request
                    .output_dir
                    .parent()
                    .map(|p| p.join("escaped.mp4"))
                    .unwrap_or_else(|| PathBuf::from("/escaped.mp4"));
                tokio::fs::write(&outside, b"outside").await?;
                Ok(outside)
            }
        }
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_discover: true,
            can_transfer: true,
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Test configuration rooted in a fresh temporary directory
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.base_dir = temp_dir.path().join("downloads");
    config.storage.retention = Duration::from_secs(300);
    config.jobs.max_concurrent_jobs = 3;
    config.jobs.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Create a test MediaService around a scripted engine.
/// Returns the service, the engine and the tempdir (which must be kept alive).
pub(crate) async fn create_test_service(
    script: Script,
) -> (MediaService, Arc<ScriptedEngine>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(&temp_dir);
    create_test_service_with_config(script, config, temp_dir).await
}

/// Same as [`create_test_service`] with a caller-adjusted config.
pub(crate) async fn create_test_service_with_config(
    script: Script,
    config: Config,
    temp_dir: TempDir,
) -> (MediaService, Arc<ScriptedEngine>, TempDir) {
    let engine = Arc::new(ScriptedEngine::new(script));
    let service = MediaService::with_engine(config, engine.clone())
        .await
        .unwrap();
    (service, engine, temp_dir)
}

/// Poll until the task reaches a terminal status
pub(crate) async fn wait_for_terminal(service: &MediaService, id: TaskId) -> TaskInfo {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = service.registry.get(id).await.unwrap();
            if task.status.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Poll until the task leaves `pending`
pub(crate) async fn wait_for_processing(service: &MediaService, id: TaskId) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = service.registry.get(id).await.unwrap();
            if task.status != crate::types::TaskStatus::Pending {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task never started");
}
