//! In-memory task registry
//!
//! Maps [`TaskId`] to the task's current [`TaskInfo`]. The registry is an
//! explicitly constructed value shared by `Arc`; there is no global instance.
//! Writers go through a closed set of [`TaskUpdate`]s, and every operation
//! holds the lock for its whole merge so pollers never observe a half-applied
//! update.

use crate::types::{FailureKind, TaskId, TaskInfo, TaskStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Mutation applied to a task record
#[derive(Clone, Debug, PartialEq)]
pub enum TaskUpdate {
    /// Transfer started: status `processing`, progress reset to 0
    Processing,
    /// Progress percentage reported by the engine
    Progress(f32),
    /// Engine reported the transfer finished; progress goes to 100 but the
    /// status waits for [`TaskUpdate::Completed`]
    Finished,
    /// Artifact stored
    Completed {
        /// Final path component of the artifact
        filename: String,
        /// Full artifact path
        filepath: PathBuf,
    },
    /// Task failed
    Failed {
        /// Failure classification
        kind: FailureKind,
        /// Human-readable error
        message: String,
    },
}

impl TaskUpdate {
    fn name(&self) -> &'static str {
        match self {
            TaskUpdate::Processing => "processing",
            TaskUpdate::Progress(_) => "progress",
            TaskUpdate::Finished => "finished",
            TaskUpdate::Completed { .. } => "completed",
            TaskUpdate::Failed { .. } => "failed",
        }
    }
}

/// Concurrency-safe store of task records
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, TaskInfo>>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `pending` task and return its fresh identifier
    pub async fn create(&self, url: impl Into<String>, format_id: impl Into<String>) -> TaskId {
        let mut tasks = self.tasks.write().await;

        let mut id = TaskId::new();
        while tasks.contains_key(&id) {
            id = TaskId::new();
        }

        tasks.insert(id, TaskInfo::pending(id, url.into(), format_id.into()));
        id
    }

    /// Apply an update to a task
    ///
    /// Returns `false` when the task is unknown, already terminal, or not yet
    /// `processing` for a progress or completion update; none of these is an
    /// error for the caller. A pending task may still fail.
    pub async fn apply(&self, id: TaskId, update: TaskUpdate) -> bool {
        let mut tasks = self.tasks.write().await;

        let Some(task) = tasks.get_mut(&id) else {
            tracing::warn!(task_id = %id, update = update.name(), "update for unknown task ignored");
            return false;
        };

        if task.status.is_terminal() {
            tracing::debug!(
                task_id = %id,
                status = %task.status,
                update = update.name(),
                "update for finished task ignored"
            );
            return false;
        }

        // Only a running transfer can report progress or complete
        let needs_processing = matches!(
            update,
            TaskUpdate::Progress(_) | TaskUpdate::Finished | TaskUpdate::Completed { .. }
        );
        if needs_processing && task.status != TaskStatus::Processing {
            tracing::debug!(
                task_id = %id,
                status = %task.status,
                update = update.name(),
                "update out of order ignored"
            );
            return false;
        }

        match update {
            TaskUpdate::Processing => {
                task.status = TaskStatus::Processing;
                task.progress = 0.0;
                task.started_at = Some(Utc::now());
            }
            TaskUpdate::Progress(percent) => {
                if !percent.is_finite() {
                    tracing::debug!(task_id = %id, "non-finite progress dropped");
                    return false;
                }
                task.progress = percent.clamp(0.0, 100.0);
            }
            TaskUpdate::Finished => {
                task.progress = 100.0;
            }
            TaskUpdate::Completed { filename, filepath } => {
                task.status = TaskStatus::Completed;
                task.progress = 100.0;
                task.filename = Some(filename);
                task.filepath = Some(filepath);
                task.error = None;
                task.failure_kind = None;
                task.finished_at = Some(Utc::now());
            }
            TaskUpdate::Failed { kind, message } => {
                task.status = TaskStatus::Failed;
                task.filename = None;
                task.filepath = None;
                task.error = Some(message);
                task.failure_kind = Some(kind);
                task.finished_at = Some(Utc::now());
            }
        }

        true
    }

    /// Snapshot of a task
    pub async fn get(&self, id: TaskId) -> Option<TaskInfo> {
        self.tasks.read().await.get(&id).cloned()
    }

    /// Mark a task failed with a generic error
    pub async fn fail(&self, id: TaskId, message: impl Into<String>) -> bool {
        self.apply(
            id,
            TaskUpdate::Failed {
                kind: FailureKind::Error,
                message: message.into(),
            },
        )
        .await
    }

    /// Snapshots of all tasks, oldest first
    pub async fn list(&self) -> Vec<TaskInfo> {
        let mut tasks: Vec<TaskInfo> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by_key(|t| t.created_at);
        tasks
    }

    /// Record that a terminal task's directory has been removed
    ///
    /// Only terminal tasks can be reclaimed.
    pub async fn mark_reclaimed(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&id) {
            Some(task) if task.status.is_terminal() && !task.reclaimed => {
                task.reclaimed = true;
                true
            }
            _ => false,
        }
    }

    /// Number of tracked tasks
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether no tasks are tracked
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
