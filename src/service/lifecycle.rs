//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::MediaService;

impl MediaService {
    /// Gracefully shut down the service
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions
    /// 2. Cancels all active jobs (queued or transferring)
    /// 3. Waits for them to record their final state, up to
    ///    `jobs.shutdown_timeout`
    /// 4. Stops background services (janitor)
    /// 5. Emits [`Event::Shutdown`]
    ///
    /// Task records stay readable afterwards; only new work is refused.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new downloads
        self.jobs
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new downloads");

        // 2. Cancel all active jobs
        self.cancel_all().await;

        // 3. Wait for active jobs to finish with timeout
        let shutdown_timeout = self.config.jobs.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All active jobs stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = shutdown_timeout.as_secs(),
                "Timeout waiting for jobs to stop, proceeding with shutdown"
            ),
        }

        // 4. Stop background services
        self.jobs.background.cancel();

        // 5. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        !self
            .jobs
            .accepting_new
            .load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Signal cancellation to every active job
    pub(crate) async fn cancel_all(&self) {
        let active = self.jobs.active_jobs.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling all active jobs");

        for (id, token) in active.iter() {
            tracing::debug!(task_id = %id, "Signaling cancellation");
            token.cancel();
        }
    }

    /// Wait until no job is registered as active
    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = {
                let active = self.jobs.active_jobs.lock().await;
                active.len()
            };

            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active jobs to stop");
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}
