//! Background service starters -- janitor and REST API server.

use crate::janitor::Janitor;

use super::MediaService;

impl MediaService {
    /// Start the janitor that reclaims expired task directories
    ///
    /// Runs until [`shutdown`](Self::shutdown). Returns an already finished
    /// handle when the janitor is disabled in configuration.
    pub fn start_janitor(&self) -> tokio::task::JoinHandle<()> {
        if !self.config.storage.janitor_enabled {
            tracing::info!("Janitor disabled, expired downloads will not be reclaimed");
            return tokio::spawn(async {});
        }

        let janitor = Janitor::new(
            self.registry.clone(),
            self.storage.clone(),
            self.event_tx.clone(),
            self.config.storage.retention,
            self.config.storage.janitor_interval,
        );
        let cancel = self.jobs.background.clone();

        let handle = tokio::spawn(janitor.run(cancel));
        tracing::info!("Janitor background task started");
        handle
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server uses `config.api.bind_address` and stops when the returned
    /// handle is aborted.
    pub fn spawn_api_server(&self) -> tokio::task::JoinHandle<crate::Result<()>> {
        let service = std::sync::Arc::new(self.clone());
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(service, config).await })
    }
}
