//! Progress bridge -- engine callbacks to registry updates.
//!
//! The engine side holds a [`ProgressReporter`] and pushes events onto an
//! unbounded channel without ever blocking or failing. A consumer task owned
//! by the job applies them to the registry. Once the transfer returns, the
//! job calls [`ProgressBridge::finish`], which drains whatever is still
//! queued, so every event reported before the transfer ended is applied
//! before the terminal update.

use crate::engine::{ProgressEvent, ProgressReporter};
use crate::registry::{TaskRegistry, TaskUpdate};
use crate::types::{Event, TaskId};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Consumer half of a job's progress channel
pub(super) struct ProgressBridge {
    handle: JoinHandle<()>,
    done: CancellationToken,
}

impl ProgressBridge {
    /// Start the consumer for task `id`
    ///
    /// The returned reporter answers `Break` once `cancel` fires.
    pub(super) fn spawn(
        id: TaskId,
        registry: Arc<TaskRegistry>,
        event_tx: broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) -> (ProgressReporter, Self) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let done = CancellationToken::new();

        let handle = tokio::spawn({
            let done = done.clone();
            async move {
                loop {
                    tokio::select! {
                        event = rx.recv() => match event {
                            Some(event) => apply_event(id, &registry, &event_tx, event).await,
                            None => break,
                        },
                        _ = done.cancelled() => {
                            while let Ok(event) = rx.try_recv() {
                                apply_event(id, &registry, &event_tx, event).await;
                            }
                            break;
                        }
                    }
                }
            }
        });

        (ProgressReporter::new(tx, cancel), Self { handle, done })
    }

    /// Apply everything still queued and stop the consumer
    pub(super) async fn finish(self) {
        self.done.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "progress consumer task failed");
        }
    }
}

async fn apply_event(
    id: TaskId,
    registry: &TaskRegistry,
    event_tx: &broadcast::Sender<Event>,
    event: ProgressEvent,
) {
    let (update, percent) = match event {
        ProgressEvent::Downloading { percent } => match parse_percent(&percent) {
            Some(value) => (TaskUpdate::Progress(value), value),
            None => {
                tracing::debug!(task_id = %id, raw = %percent, "unparseable progress value skipped");
                return;
            }
        },
        ProgressEvent::Finished => (TaskUpdate::Finished, 100.0),
    };

    if registry.apply(id, update).await {
        event_tx
            .send(Event::Progress {
                id,
                percent: percent.clamp(0.0, 100.0),
            })
            .ok();
    }
}

fn ansi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid ansi regex")
    })
}

/// Parse an engine percentage such as `" 42.5%"`
///
/// Whitespace and ANSI colour sequences are ignored. Returns `None` for
/// anything that is not a finite number.
pub(crate) fn parse_percent(raw: &str) -> Option<f32> {
    let cleaned = ansi_regex().replace_all(raw, "");
    let value: f32 = cleaned.trim().trim_end_matches('%').trim().parse().ok()?;
    value.is_finite().then_some(value)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    #[test]
    fn parse_percent_handles_engine_formatting() {
        assert_eq!(parse_percent("42.5%"), Some(42.5));
        assert_eq!(parse_percent("  7.0% "), Some(7.0));
        assert_eq!(parse_percent("\u{1b}[0;94m 63.2%\u{1b}[0m"), Some(63.2));
        assert_eq!(parse_percent("100"), Some(100.0));
    }

    #[test]
    fn parse_percent_rejects_garbage() {
        assert_eq!(parse_percent("N/A"), None);
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("inf%"), None);
        assert_eq!(parse_percent("NaN"), None);
    }

    #[tokio::test]
    async fn finish_applies_everything_reported_before_it() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.create("https://example.test/v", "best").await;
        registry.apply(id, TaskUpdate::Processing).await;
        let (event_tx, mut events) = broadcast::channel(16);

        let (reporter, bridge) =
            ProgressBridge::spawn(id, registry.clone(), event_tx, CancellationToken::new());
        let _ = reporter.report(ProgressEvent::Downloading {
            percent: "12.5%".into(),
        });
        let _ = reporter.report(ProgressEvent::Downloading {
            percent: "garbage".into(),
        });
        let _ = reporter.report(ProgressEvent::Downloading {
            percent: " 64.0%".into(),
        });
        bridge.finish().await;

        let task = registry.get(id).await.unwrap();
        assert_eq!(task.progress, 64.0);
        assert_eq!(task.status, TaskStatus::Processing);

        assert!(matches!(events.try_recv().unwrap(), Event::Progress { percent, .. } if percent == 12.5));
        assert!(matches!(events.try_recv().unwrap(), Event::Progress { percent, .. } if percent == 64.0));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn finished_event_sets_full_progress_only() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.create("https://example.test/v", "best").await;
        registry.apply(id, TaskUpdate::Processing).await;
        let (event_tx, _events) = broadcast::channel(16);

        let (reporter, bridge) =
            ProgressBridge::spawn(id, registry.clone(), event_tx, CancellationToken::new());
        let _ = reporter.report(ProgressEvent::Finished);
        bridge.finish().await;

        let task = registry.get(id).await.unwrap();
        assert_eq!(task.progress, 100.0);
        assert_eq!(task.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn reporter_breaks_after_cancel() {
        let registry = Arc::new(TaskRegistry::new());
        let id = registry.create("https://example.test/v", "best").await;
        let (event_tx, _events) = broadcast::channel(16);
        let cancel = CancellationToken::new();

        let (reporter, bridge) = ProgressBridge::spawn(id, registry, event_tx, cancel.clone());
        cancel.cancel();
        assert!(reporter.report(ProgressEvent::Finished).is_break());
        bridge.finish().await;
    }
}
