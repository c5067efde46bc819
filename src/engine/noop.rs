//! No-op engine for graceful degradation

use super::traits::{EngineCapabilities, MediaEngine, ProgressReporter, TransferRequest};
use crate::types::MediaInfo;
use async_trait::async_trait;
use std::path::PathBuf;

/// Engine used when no yt-dlp binary is available or configured
///
/// Every operation returns `Error::NotSupported`, so the service and API keep
/// running and report the missing dependency per request.
///
/// # Examples
///
/// ```
/// use mediasense::engine::{MediaEngine, NoOpEngine};
///
/// # #[tokio::main]
/// # async fn main() {
/// let engine = NoOpEngine;
/// assert!(engine.discover("https://example.com/v").await.is_err());
/// assert!(!engine.capabilities().can_transfer);
/// # }
/// ```
pub struct NoOpEngine;

#[async_trait]
impl MediaEngine for NoOpEngine {
    async fn discover(&self, _url: &str) -> crate::Result<MediaInfo> {
        Err(crate::Error::NotSupported(
            "media discovery requires the external yt-dlp binary. \
             Configure engine.ytdlp_path or ensure yt-dlp is in PATH."
                .into(),
        ))
    }

    async fn transfer(
        &self,
        _request: TransferRequest,
        _reporter: ProgressReporter,
    ) -> crate::Result<PathBuf> {
        Err(crate::Error::NotSupported(
            "downloads require the external yt-dlp binary. \
             Configure engine.ytdlp_path or ensure yt-dlp is in PATH."
                .into(),
        ))
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_discover: false,
            can_transfer: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
