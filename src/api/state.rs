//! Application state for the API server

use crate::{Config, MediaService};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The media service handling analysis, submissions and file access
    pub service: Arc<MediaService>,

    /// Configuration (read-only at runtime)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(service: Arc<MediaService>, config: Arc<Config>) -> Self {
        Self { service, config }
    }
}
