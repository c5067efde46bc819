//! End-to-end task flow through the public API with an in-process engine
//!
//! Exercises submission, progress events, file retrieval, retention-based
//! reclamation and shutdown without any external binary.

use async_trait::async_trait;
use mediasense::{
    Config, EngineCapabilities, Error, Event, FormatKind, MediaEngine, MediaFormat, MediaInfo,
    MediaService, ProgressEvent, ProgressReporter, TaskError, TaskId, TaskInfo, TaskStatus,
    TransferRequest,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

/// Writes `<format>.bin` after reporting a few progress steps
struct LocalEngine;

#[async_trait]
impl MediaEngine for LocalEngine {
    async fn discover(&self, url: &str) -> mediasense::Result<MediaInfo> {
        Ok(MediaInfo {
            title: url.to_string(),
            thumbnail: None,
            duration: "0:30".into(),
            platform: Some("local".into()),
            formats: vec![MediaFormat {
                resolution: "Best Quality".into(),
                ext: "bin".into(),
                size: "Variable".into(),
                format_id: "best".into(),
                kind: FormatKind::Best,
            }],
        })
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        reporter: ProgressReporter,
    ) -> mediasense::Result<PathBuf> {
        for percent in ["25.0%", "50.0%", "75.0%"] {
            if reporter
                .report(ProgressEvent::Downloading {
                    percent: percent.into(),
                })
                .is_break()
            {
                return Err(mediasense::ExtractionError::Cancelled.into());
            }
        }
        let _ = reporter.report(ProgressEvent::Finished);

        let path = request.output_dir.join(format!("{}.bin", request.format));
        tokio::fs::write(&path, request.url.as_bytes()).await?;
        Ok(path)
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_discover: true,
            can_transfer: true,
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

async fn create_service(retention: Duration) -> (MediaService, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.base_dir = temp_dir.path().join("downloads");
    config.storage.retention = retention;
    config.storage.janitor_interval = Duration::from_millis(50);

    let service = MediaService::with_engine(config, Arc::new(LocalEngine))
        .await
        .unwrap();
    (service, temp_dir)
}

async fn wait_until(
    service: &MediaService,
    id: TaskId,
    done: impl Fn(&TaskInfo) -> bool,
) -> TaskInfo {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = service.status(id).await.unwrap();
            if done(&task) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time")
}

#[tokio::test]
async fn submitted_task_completes_and_serves_its_file() {
    let (service, _temp) = create_service(Duration::from_secs(300)).await;
    let mut events = service.subscribe();

    let info = service.analyze("https://media.test/v/1").await.unwrap();
    assert_eq!(info.formats[0].format_id, "best");

    let id = service.submit("https://media.test/v/1", "best").await.unwrap();
    assert_eq!(service.status(id).await.unwrap().url, "https://media.test/v/1");

    let task = wait_until(&service, id, |t| t.status.is_terminal()).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.filename.as_deref(), Some("best.bin"));

    let mut file = service.open_file(id).await.unwrap();
    let mut contents = String::new();
    file.file.read_to_string(&mut contents).await.unwrap();
    assert_eq!(contents, "https://media.test/v/1");

    let mut percents = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let Event::Progress { percent, .. } = event {
            percents.push(percent);
        }
    }
    assert_eq!(percents, vec![25.0, 50.0, 75.0, 100.0]);
}

#[tokio::test]
async fn janitor_reclaims_expired_artifacts() {
    let (service, _temp) = create_service(Duration::ZERO).await;
    let janitor = service.start_janitor();

    let id = service.submit("https://media.test/v/2", "best").await.unwrap();
    let task = wait_until(&service, id, |t| t.reclaimed).await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(!service.storage().task_dir(id).exists());

    let err = service.open_file(id).await.unwrap_err();
    assert!(matches!(err, Error::Task(TaskError::FileUnavailable { .. })));

    service.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), janitor)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn shutdown_rejects_new_submissions() {
    let (service, _temp) = create_service(Duration::from_secs(300)).await;
    let mut events = service.subscribe();

    service.shutdown().await.unwrap();
    assert!(service.is_shutting_down());

    let err = service.submit("https://media.test/v/3", "best").await.unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        saw_shutdown |= matches!(event, Event::Shutdown);
    }
    assert!(saw_shutdown);
}

#[tokio::test]
async fn run_with_shutdown_returns_once_service_is_shut_down() {
    let (service, _temp) = create_service(Duration::from_secs(300)).await;

    let runner = tokio::spawn(mediasense::run_with_shutdown(service.clone()));
    service.shutdown().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("runner should stop after shutdown")
        .unwrap()
        .unwrap();
}
