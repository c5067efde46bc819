//! Task inspection and control (status, list, cancel, file access).

use crate::error::{Result, TaskError};
use crate::registry::TaskUpdate;
use crate::storage::FileLease;
use crate::types::{Event, FailureKind, TaskId, TaskInfo, TaskStatus};

use super::MediaService;

/// An open artifact ready to be streamed
///
/// Holds a [`FileLease`] for as long as it (or the stream built from it)
/// lives, so the janitor will not reclaim the directory mid-transfer.
#[derive(Debug)]
pub struct TaskFile {
    /// Open file handle
    pub file: tokio::fs::File,
    /// Stored file name
    pub filename: String,
    /// File size in bytes
    pub len: u64,
    /// Read lease on the task's directory
    pub lease: FileLease,
}

impl MediaService {
    /// Snapshot of a task
    pub async fn status(&self, id: TaskId) -> Result<TaskInfo> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| TaskError::NotFound { id }.into())
    }

    /// Snapshots of all tasks, oldest first
    pub async fn list(&self) -> Vec<TaskInfo> {
        self.registry.list().await
    }

    /// Cancel a pending or processing task
    ///
    /// Returns as soon as the job has been signalled; the task becomes
    /// `failed` with [`FailureKind::Cancelled`] once the job notices.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown ID
    /// - [`TaskError::AlreadyFinished`] for a task that already completed or failed
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        let task = self.status(id).await?;
        if task.status.is_terminal() {
            return Err(TaskError::AlreadyFinished {
                id,
                status: task.status,
            }
            .into());
        }

        let token = {
            let active = self.jobs.active_jobs.lock().await;
            active.get(&id).cloned()
        };

        match token {
            Some(token) => {
                token.cancel();
                tracing::info!(task_id = %id, "cancellation requested");
                Ok(())
            }
            None => self.cancel_detached(id).await,
        }
    }

    /// Fail a task whose job is no longer registered as active
    ///
    /// The job may have finished between the caller's status check and the
    /// token lookup; in that case the task keeps its final state and the
    /// caller gets [`TaskError::AlreadyFinished`].
    pub(super) async fn cancel_detached(&self, id: TaskId) -> Result<()> {
        let message = crate::error::ExtractionError::Cancelled.to_string();
        let applied = self
            .registry
            .apply(
                id,
                TaskUpdate::Failed {
                    kind: FailureKind::Cancelled,
                    message: message.clone(),
                },
            )
            .await;

        if !applied {
            let task = self.status(id).await?;
            return Err(TaskError::AlreadyFinished {
                id,
                status: task.status,
            }
            .into());
        }

        self.storage.cleanup(id).await;
        self.emit_event(Event::Failed {
            id,
            kind: FailureKind::Cancelled,
            error: message,
        });
        Ok(())
    }

    /// Open a completed task's artifact for streaming
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown ID
    /// - [`TaskError::NotReady`] when the task has not completed
    /// - [`TaskError::FileUnavailable`] when the artifact was reclaimed,
    ///   never recorded, or is missing on disk
    pub async fn open_file(&self, id: TaskId) -> Result<TaskFile> {
        let task = self.status(id).await?;
        if task.status != TaskStatus::Completed {
            return Err(TaskError::NotReady {
                id,
                status: task.status,
            }
            .into());
        }

        if task.reclaimed {
            return Err(TaskError::FileUnavailable {
                id,
                reason: "file expired and was removed".into(),
            }
            .into());
        }

        let (Some(path), Some(filename)) = (task.filepath, task.filename) else {
            return Err(TaskError::FileUnavailable {
                id,
                reason: "no file recorded for task".into(),
            }
            .into());
        };

        let lease = self.storage.lease(id);

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            tracing::warn!(task_id = %id, ?path, error = %e, "artifact missing on disk");
            TaskError::FileUnavailable {
                id,
                reason: "file not found on server".into(),
            }
        })?;
        let len = file.metadata().await?.len();

        Ok(TaskFile {
            file,
            filename,
            len,
            lease,
        })
    }
}
