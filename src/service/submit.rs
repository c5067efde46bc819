//! URL validation, format discovery and task submission.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::types::{Event, FormatSelector, MediaInfo, TaskId};

use super::MediaService;
use super::executor::{JobContext, run_job};

/// Shortest URL accepted
const MIN_URL_LEN: usize = 5;

/// Check that `url` is an absolute http(s) URL with a host
///
/// Runs before any task exists, so a bad URL never shows up in the registry.
pub fn validate_url(url: &str) -> Result<url::Url> {
    let trimmed = url.trim();
    if trimmed.len() < MIN_URL_LEN {
        return Err(Error::Validation(format!(
            "url must be at least {MIN_URL_LEN} characters"
        )));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::Validation(format!("invalid url '{trimmed}': {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Validation(format!(
            "unsupported url scheme '{}', expected http or https",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::Validation(format!("url '{trimmed}' has no host")));
    }

    Ok(parsed)
}

impl MediaService {
    /// Discover title, duration and downloadable formats of a URL
    pub async fn analyze(&self, url: &str) -> Result<MediaInfo> {
        let url = validate_url(url)?;
        tracing::debug!(url = %url, engine = self.engine.name(), "analyzing url");

        self.engine.discover(url.as_str()).await.inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, "format discovery failed");
        })
    }

    /// Submit a download and return its task ID immediately
    ///
    /// The task starts `pending`; a detached job moves it through
    /// `processing` to `completed` or `failed`. Failures after this point
    /// are recorded on the task, never returned here.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] once [`shutdown`](Self::shutdown) has begun
    /// - [`Error::Validation`] for a malformed URL
    pub async fn submit(&self, url: &str, format_id: &str) -> Result<TaskId> {
        if !self.jobs.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let url = validate_url(url)?;
        let format = FormatSelector::parse(format_id);

        let id = self.registry.create(url.as_str(), format.to_string()).await;
        tracing::info!(task_id = %id, url = %url, format = %format, "download submitted");
        self.emit_event(Event::Queued {
            id,
            url: url.to_string(),
        });

        let cancel_token = tokio_util::sync::CancellationToken::new();
        {
            let mut active = self.jobs.active_jobs.lock().await;
            // Shutdown may have swept the active set since the check above
            if !self.jobs.accepting_new.load(Ordering::SeqCst) {
                tracing::info!(task_id = %id, "shutdown began during submission, cancelling");
                cancel_token.cancel();
            }
            active.insert(id, cancel_token.clone());
        }

        let ctx = JobContext {
            id,
            url: url.to_string(),
            format,
            registry: Arc::clone(&self.registry),
            storage: Arc::clone(&self.storage),
            engine: Arc::clone(&self.engine),
            event_tx: self.event_tx.clone(),
            config: Arc::clone(&self.config),
            active_jobs: Arc::clone(&self.jobs.active_jobs),
            concurrent_limit: Arc::clone(&self.jobs.concurrent_limit),
            cancel_token,
        };

        tokio::spawn(run_job(ctx));

        Ok(id)
    }
}
