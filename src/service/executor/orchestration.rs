//! Job orchestration -- top-level lifecycle for a single task.

use std::path::{Path, PathBuf};

use crate::engine::TransferRequest;
use crate::error::{Error, ExtractionError, Result};
use crate::registry::TaskUpdate;
use crate::types::{Event, FailureKind};

use super::context::JobContext;
use super::progress::ProgressBridge;

/// Core job task -- orchestrates the full lifecycle of a single download.
///
/// Phases:
/// 1. Wait for a concurrency permit (the task stays `pending`)
/// 2. Allocate the task's storage directory
/// 3. Transition to `processing`
/// 4. Run the engine transfer under the task deadline, bridging progress
/// 5. Verify the artifact and finalize as `completed` or `failed`
pub(crate) async fn run_job(ctx: JobContext) {
    let id = ctx.id;

    // Phase 1: Acquire a permit, unless cancelled while queued
    let permit = tokio::select! {
        permit = ctx.concurrent_limit.clone().acquire_owned() => permit,
        _ = ctx.cancel_token.cancelled() => {
            tracing::info!(task_id = %id, "task cancelled while queued");
            ctx.mark_failed(FailureKind::Cancelled, &ExtractionError::Cancelled.to_string()).await;
            ctx.remove_from_active().await;
            return;
        }
    };
    let _permit = match permit {
        Ok(p) => p,
        Err(_) => {
            ctx.mark_failed(FailureKind::Error, "job scheduler closed").await;
            ctx.remove_from_active().await;
            return;
        }
    };

    // Phase 2: Allocate the task directory
    let output_dir = match ctx.storage.allocate(id).await {
        Ok(dir) => dir,
        Err(e) => {
            tracing::error!(task_id = %id, error = %e, "failed to allocate task directory");
            ctx.mark_failed(FailureKind::Error, &e.to_string()).await;
            ctx.remove_from_active().await;
            return;
        }
    };

    if ctx.cancel_token.is_cancelled() {
        ctx.mark_failed(FailureKind::Cancelled, &ExtractionError::Cancelled.to_string()).await;
        ctx.remove_from_active().await;
        return;
    }

    // Phase 3: Processing
    ctx.registry.apply(id, TaskUpdate::Processing).await;
    ctx.event_tx.send(Event::Processing { id }).ok();
    tracing::info!(task_id = %id, engine = ctx.engine.name(), "transfer started");

    // Phase 4: Transfer with progress bridge and deadline
    let (reporter, bridge) = ProgressBridge::spawn(
        id,
        ctx.registry.clone(),
        ctx.event_tx.clone(),
        ctx.cancel_token.clone(),
    );

    let request = TransferRequest {
        url: ctx.url.clone(),
        format: ctx.format.clone(),
        output_dir: output_dir.clone(),
        cookies: ctx.config.engine.cookie_file_contents(),
        proxy: ctx.config.engine.proxy.clone(),
    };

    let transfer = ctx.engine.transfer(request, reporter);
    let outcome = match ctx.config.jobs.max_task_duration {
        Some(limit) => match tokio::time::timeout(limit, transfer).await {
            Ok(result) => result,
            Err(_) => {
                ctx.cancel_token.cancel();
                Err(ExtractionError::TimedOut {
                    secs: limit.as_secs(),
                }
                .into())
            }
        },
        None => transfer.await,
    };

    bridge.finish().await;

    // Phase 5: Finalize
    let outcome = match outcome {
        Ok(path) => verify_artifact(&path, &output_dir).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(filepath) => {
            let filename = filepath
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let applied = ctx
                .registry
                .apply(
                    id,
                    TaskUpdate::Completed {
                        filename: filename.clone(),
                        filepath: filepath.clone(),
                    },
                )
                .await;

            if applied {
                tracing::info!(task_id = %id, ?filepath, "download completed");
                ctx.event_tx.send(Event::Completed { id, filename }).ok();
            } else {
                // Cancelled between the engine finishing and this update
                ctx.storage.cleanup(id).await;
            }
        }
        Err(e) => {
            let kind = failure_kind(&e, ctx.cancel_token.is_cancelled());
            match kind {
                FailureKind::Error => {
                    tracing::error!(task_id = %id, error = %e, "download failed")
                }
                _ => tracing::info!(task_id = %id, error = %e, "download stopped"),
            }
            ctx.mark_failed(kind, &e.to_string()).await;
        }
    }

    ctx.remove_from_active().await;
}

/// Classify a job error
fn failure_kind(error: &Error, cancelled: bool) -> FailureKind {
    match error {
        Error::Extraction(ExtractionError::TimedOut { .. }) => FailureKind::TimedOut,
        Error::Extraction(ExtractionError::Cancelled) => FailureKind::Cancelled,
        _ if cancelled => FailureKind::Cancelled,
        _ => FailureKind::Error,
    }
}

/// Check that the engine's reported path is a regular file inside `dir`
async fn verify_artifact(path: &Path, dir: &Path) -> Result<PathBuf> {
    let no_output = || ExtractionError::NoOutput {
        dir: dir.to_path_buf(),
    };

    let resolved = tokio::fs::canonicalize(path).await.map_err(|_| no_output())?;
    let dir = tokio::fs::canonicalize(dir).await.map_err(|_| no_output())?;

    if !resolved.starts_with(&dir) || resolved == dir {
        return Err(ExtractionError::OutsideTaskDir {
            path: resolved,
            dir,
        }
        .into());
    }

    let metadata = tokio::fs::metadata(&resolved).await?;
    if !metadata.is_file() {
        return Err(no_output().into());
    }

    Ok(resolved)
}
