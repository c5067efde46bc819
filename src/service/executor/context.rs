//! Job context -- shared state and helpers for a single job.

use crate::config::Config;
use crate::engine::MediaEngine;
use crate::registry::{TaskRegistry, TaskUpdate};
use crate::storage::StorageManager;
use crate::types::{Event, FailureKind, FormatSelector, TaskId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// Shared context for a single job, reducing parameter passing between helpers.
pub(crate) struct JobContext {
    pub(crate) id: TaskId,
    pub(crate) url: String,
    pub(crate) format: FormatSelector,
    pub(crate) registry: Arc<TaskRegistry>,
    pub(crate) storage: Arc<StorageManager>,
    pub(crate) engine: Arc<dyn MediaEngine>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) config: Arc<Config>,
    pub(crate) active_jobs: Arc<Mutex<HashMap<TaskId, CancellationToken>>>,
    pub(crate) concurrent_limit: Arc<Semaphore>,
    pub(crate) cancel_token: CancellationToken,
}

impl JobContext {
    /// Remove this job from the active jobs map.
    pub(super) async fn remove_from_active(&self) {
        let mut active = self.active_jobs.lock().await;
        active.remove(&self.id);
    }

    /// Mark the task failed, drop any partial output and emit the failure event.
    pub(super) async fn mark_failed(&self, kind: FailureKind, error: &str) {
        let applied = self
            .registry
            .apply(
                self.id,
                TaskUpdate::Failed {
                    kind,
                    message: error.to_string(),
                },
            )
            .await;

        self.storage.cleanup(self.id).await;

        if applied {
            self.event_tx
                .send(Event::Failed {
                    id: self.id,
                    kind,
                    error: error.to_string(),
                })
                .ok();
        }
    }
}
