//! Periodic reclamation of expired task directories
//!
//! Finished tasks keep their artifact for the configured retention window so
//! clients have time to fetch it. The janitor runs on a fixed interval and:
//!
//! - removes the directory of every terminal task whose retention has lapsed,
//!   unless a [`FileLease`](crate::storage::FileLease) is still held on it
//! - marks those records `reclaimed` (the registry record itself is kept)
//! - removes orphan directories with no registry record, e.g. left over from a
//!   previous process, once their modification time is older than retention
//!
//! Pending and processing tasks are never touched.
//!
//! # Example
//!
//! ```no_run
//! use mediasense::{Config, MediaService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MediaService::new(Config::default()).await?;
//!
//! // Runs until service.shutdown() is called
//! let janitor = service.start_janitor();
//! # Ok(())
//! # }
//! ```

use crate::registry::TaskRegistry;
use crate::storage::StorageManager;
use crate::types::Event;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Terminal tasks whose directory was reclaimed
    pub reclaimed: usize,
    /// Directories without a registry record that were removed
    pub orphans_removed: usize,
    /// Expired tasks skipped because a file transfer still holds a lease
    pub skipped_leased: usize,
}

/// Background sweeper enforcing the retention window
pub struct Janitor {
    registry: Arc<TaskRegistry>,
    storage: Arc<StorageManager>,
    event_tx: broadcast::Sender<Event>,
    retention: Duration,
    interval: Duration,
}

impl Janitor {
    /// Create a janitor
    pub fn new(
        registry: Arc<TaskRegistry>,
        storage: Arc<StorageManager>,
        event_tx: broadcast::Sender<Event>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            storage,
            event_tx,
            retention,
            interval,
        }
    }

    /// Sweep every interval until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "janitor started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.sweep_once().await;
                    if report != SweepReport::default() {
                        info!(
                            reclaimed = report.reclaimed,
                            orphans_removed = report.orphans_removed,
                            skipped_leased = report.skipped_leased,
                            "janitor sweep finished"
                        );
                    }
                }
            }
        }

        info!("janitor stopped");
    }

    /// Run a single sweep
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let retention = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();

        for task in self.registry.list().await {
            if !task.status.is_terminal() || task.reclaimed {
                continue;
            }
            let Some(finished_at) = task.finished_at else {
                continue;
            };
            if now.signed_duration_since(finished_at) < retention {
                continue;
            }

            if self.storage.active_leases(task.id) > 0 {
                debug!(task_id = %task.id, "expired task still being served, skipping");
                report.skipped_leased += 1;
                continue;
            }

            self.storage.cleanup(task.id).await;
            if self.registry.mark_reclaimed(task.id).await {
                debug!(task_id = %task.id, "reclaimed task directory");
                self.event_tx.send(Event::Reclaimed { id: task.id }).ok();
                report.reclaimed += 1;
            }
        }

        let entries = match self.storage.list_task_dirs().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "failed to list storage directory");
                return report;
            }
        };

        for entry in entries {
            if let Some(id) = entry.id
                && (self.registry.get(id).await.is_some() || self.storage.active_leases(id) > 0)
            {
                continue;
            }

            let age = entry
                .modified
                .and_then(|m| SystemTime::now().duration_since(m).ok())
                .unwrap_or_default();
            if age < self.retention {
                continue;
            }

            if self.storage.remove_path(&entry.path).await {
                debug!(path = ?entry.path, "removed orphan directory");
                report.orphans_removed += 1;
            }
        }

        report
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskUpdate;
    use crate::types::{TaskId, TaskStatus};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        registry: Arc<TaskRegistry>,
        storage: Arc<StorageManager>,
        event_tx: broadcast::Sender<Event>,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let storage = Arc::new(StorageManager::new(temp.path().join("downloads")));
            storage.init().await.unwrap();
            let (event_tx, _rx) = broadcast::channel(16);
            Self {
                _temp: temp,
                registry: Arc::new(TaskRegistry::new()),
                storage,
                event_tx,
            }
        }

        fn janitor(&self, retention: Duration) -> Janitor {
            Janitor::new(
                self.registry.clone(),
                self.storage.clone(),
                self.event_tx.clone(),
                retention,
                Duration::from_millis(10),
            )
        }

        async fn completed_task(&self) -> TaskId {
            let id = self.registry.create("https://example.test/v", "best").await;
            let dir = self.storage.allocate(id).await.unwrap();
            let path = dir.join("clip.mp4");
            tokio::fs::write(&path, b"video").await.unwrap();
            self.registry.apply(id, TaskUpdate::Processing).await;
            self.registry
                .apply(
                    id,
                    TaskUpdate::Completed {
                        filename: "clip.mp4".into(),
                        filepath: path,
                    },
                )
                .await;
            id
        }
    }

    #[tokio::test]
    async fn expired_terminal_tasks_are_reclaimed() {
        let fx = Fixture::new().await;
        let id = fx.completed_task().await;
        let mut events = fx.event_tx.subscribe();

        let report = fx.janitor(Duration::ZERO).sweep_once().await;

        assert_eq!(report.reclaimed, 1);
        assert!(!fx.storage.task_dir(id).exists());
        let task = fx.registry.get(id).await.unwrap();
        assert!(task.reclaimed);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(matches!(events.try_recv().unwrap(), Event::Reclaimed { id: got } if got == id));

        let again = fx.janitor(Duration::ZERO).sweep_once().await;
        assert_eq!(again.reclaimed, 0);
    }

    #[tokio::test]
    async fn tasks_within_retention_are_kept() {
        let fx = Fixture::new().await;
        let id = fx.completed_task().await;

        let report = fx.janitor(Duration::from_secs(300)).sweep_once().await;

        assert_eq!(report, SweepReport::default());
        assert!(fx.storage.task_dir(id).join("clip.mp4").exists());
        assert!(!fx.registry.get(id).await.unwrap().reclaimed);
    }

    #[tokio::test]
    async fn leased_tasks_are_skipped_until_released() {
        let fx = Fixture::new().await;
        let id = fx.completed_task().await;
        let janitor = fx.janitor(Duration::ZERO);

        let lease = fx.storage.lease(id);
        let report = janitor.sweep_once().await;
        assert_eq!(report.skipped_leased, 1);
        assert!(fx.storage.task_dir(id).exists());

        drop(lease);
        let report = janitor.sweep_once().await;
        assert_eq!(report.reclaimed, 1);
        assert!(!fx.storage.task_dir(id).exists());
    }

    #[tokio::test]
    async fn non_terminal_tasks_are_never_touched() {
        let fx = Fixture::new().await;
        let id = fx.registry.create("https://example.test/v", "best").await;
        fx.storage.allocate(id).await.unwrap();
        fx.registry.apply(id, TaskUpdate::Processing).await;

        let report = fx.janitor(Duration::ZERO).sweep_once().await;

        assert_eq!(report, SweepReport::default());
        assert!(fx.storage.task_dir(id).exists());
    }

    #[tokio::test]
    async fn stale_orphans_are_removed() {
        let fx = Fixture::new().await;
        let orphan = fx.storage.allocate(TaskId::new()).await.unwrap();
        let stray = fx.storage.base_dir().join("leftover");
        tokio::fs::create_dir_all(&stray).await.unwrap();

        let report = fx.janitor(Duration::ZERO).sweep_once().await;

        assert_eq!(report.orphans_removed, 2);
        assert!(!orphan.exists());
        assert!(!stray.exists());
    }

    #[tokio::test]
    async fn fresh_orphans_are_kept() {
        let fx = Fixture::new().await;
        let orphan = fx.storage.allocate(TaskId::new()).await.unwrap();

        let report = fx.janitor(Duration::from_secs(300)).sweep_once().await;

        assert_eq!(report.orphans_removed, 0);
        assert!(orphan.exists());
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let fx = Fixture::new().await;
        let id = fx.completed_task().await;
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(fx.janitor(Duration::ZERO).run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(fx.registry.get(id).await.unwrap().reclaimed);
    }
}
