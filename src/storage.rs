//! Per-task artifact storage
//!
//! Every task owns exactly one directory `<base_dir>/<task_id>/`. The
//! directory is allocated before the transfer starts and removed either when
//! the task fails or when the janitor reclaims it after the retention window.
//!
//! Files being streamed to a client are protected by a [`FileLease`]; the
//! janitor skips any task with an active lease.

use crate::error::{Result, StorageError};
use crate::types::TaskId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

type LeaseTable = Arc<Mutex<HashMap<TaskId, usize>>>;

/// A directory found under the base directory
#[derive(Clone, Debug)]
pub struct TaskDirEntry {
    /// Task identifier, when the directory name parses as one
    pub id: Option<TaskId>,
    /// Directory path
    pub path: PathBuf,
    /// Last modification time, if the filesystem reports one
    pub modified: Option<SystemTime>,
}

/// Owner of the base download directory
#[derive(Debug)]
pub struct StorageManager {
    base_dir: PathBuf,
    leases: LeaseTable,
}

impl StorageManager {
    /// Create a manager rooted at `base_dir` (nothing is created yet)
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create the base directory if it does not exist
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_dir).await.map_err(|e| {
            StorageError::BaseDirFailed {
                path: self.base_dir.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory belonging to a task (may not exist)
    pub fn task_dir(&self, id: TaskId) -> PathBuf {
        self.base_dir.join(id.to_string())
    }

    /// Create the task's directory; calling it again is harmless
    pub async fn allocate(&self, id: TaskId) -> Result<PathBuf> {
        let dir = self.task_dir(id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::AllocateFailed {
                id,
                path: dir.clone(),
                reason: e.to_string(),
            })?;

        debug!(task_id = %id, ?dir, "allocated task directory");
        Ok(dir)
    }

    /// Remove the task's directory and everything in it
    ///
    /// Returns whether a directory was removed. A missing directory is not an
    /// error; other failures are logged and swallowed.
    pub async fn cleanup(&self, id: TaskId) -> bool {
        let dir = self.task_dir(id);
        remove_dir(&dir, Some(id)).await
    }

    /// Remove an arbitrary directory under the base directory
    pub(crate) async fn remove_path(&self, path: &Path) -> bool {
        if !path.starts_with(&self.base_dir) {
            warn!(?path, "refusing to remove path outside the base directory");
            return false;
        }
        remove_dir(path, None).await
    }

    /// Take a read lease on a task's artifact
    pub fn lease(&self, id: TaskId) -> FileLease {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        *leases.entry(id).or_insert(0) += 1;
        FileLease {
            id,
            leases: self.leases.clone(),
        }
    }

    /// Number of live leases on a task
    pub fn active_leases(&self, id: TaskId) -> usize {
        let leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        leases.get(&id).copied().unwrap_or(0)
    }

    /// List the directories directly under the base directory
    pub async fn list_task_dirs(&self) -> Result<Vec<TaskDirEntry>> {
        let mut entries = Vec::new();

        let mut read_dir = match fs::read_dir(&self.base_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = ?entry.path(), error = %e, "failed to stat storage entry");
                    continue;
                }
            };
            if !metadata.is_dir() {
                continue;
            }

            let id = entry.file_name().to_str().and_then(|name| name.parse().ok());
            entries.push(TaskDirEntry {
                id,
                path: entry.path(),
                modified: metadata.modified().ok(),
            });
        }

        Ok(entries)
    }
}

async fn remove_dir(dir: &Path, id: Option<TaskId>) -> bool {
    match fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!(task_id = ?id, ?dir, "removed task directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(task_id = ?id, ?dir, error = %e, "failed to remove task directory");
            false
        }
    }
}

/// RAII read lease on a task's artifact
///
/// Released when dropped, including when an HTTP body stream holding it is
/// dropped mid-transfer.
#[derive(Debug)]
pub struct FileLease {
    id: TaskId,
    leases: LeaseTable,
}

impl FileLease {
    /// Task the lease protects
    pub fn task_id(&self) -> TaskId {
        self.id
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        let mut leases = self.leases.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = leases.get_mut(&self.id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                leases.remove(&self.id);
            }
        }
    }
}
