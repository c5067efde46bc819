//! Traits and types for media extraction engines

use crate::types::{FormatSelector, MediaInfo};
use async_trait::async_trait;
use std::ops::ControlFlow;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Progress notification emitted by an engine during a transfer
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Bytes are flowing; `percent` is the engine's raw text (e.g. `" 42.5%"`)
    Downloading {
        /// Unparsed percentage string
        percent: String,
    },
    /// A stream finished downloading (merging or moving may still follow)
    Finished,
}

/// Synchronous progress callback handed to an engine
///
/// [`report`](Self::report) never fails upward: it enqueues the event and
/// tells the engine whether to keep going. Once the task is cancelled it
/// returns [`ControlFlow::Break`] and the engine is expected to abort.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    cancel: CancellationToken,
}

impl ProgressReporter {
    /// Create a reporter feeding `tx`, observing `cancel`
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Forward an event to the task's progress consumer
    pub fn report(&self, event: ProgressEvent) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        if self.tx.send(event).is_err() {
            tracing::trace!("progress consumer gone, event dropped");
        }

        ControlFlow::Continue(())
    }

    /// Whether the task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the task is cancelled
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Everything an engine needs to perform one transfer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Source URL
    pub url: String,
    /// Format to fetch
    pub format: FormatSelector,
    /// The task's own storage directory; the artifact must land inside it
    pub output_dir: PathBuf,
    /// Netscape cookie-file contents, if credentials are configured
    pub cookies: Option<String>,
    /// Outbound proxy URL
    pub proxy: Option<String>,
}

/// Capabilities of an engine implementation
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    /// Can list formats for a URL
    pub can_discover: bool,
    /// Can download media
    pub can_transfer: bool,
}

/// Trait for media extraction engines
///
/// Implementations can drive an external binary or provide stub
/// functionality for graceful degradation when no engine is installed.
///
/// # Examples
///
/// ```no_run
/// use mediasense::engine::{MediaEngine, YtDlpEngine};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found");
/// let info = engine.discover("https://example.com/watch?v=abc").await?;
/// for format in &info.formats {
///     println!("{} {} {}", format.format_id, format.resolution, format.size);
/// }
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Discover title, duration and downloadable formats of a URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not supported, the engine cannot be
    /// executed, or its output cannot be parsed.
    async fn discover(&self, url: &str) -> crate::Result<MediaInfo>;

    /// Download the requested format into `request.output_dir`
    ///
    /// Progress is pushed through `reporter`; when it answers
    /// [`ControlFlow::Break`] the engine aborts with
    /// [`ExtractionError::Cancelled`](crate::error::ExtractionError::Cancelled).
    ///
    /// # Returns
    ///
    /// Path of the produced file.
    async fn transfer(
        &self,
        request: TransferRequest,
        reporter: ProgressReporter,
    ) -> crate::Result<PathBuf>;

    /// Query capabilities of this engine
    fn capabilities(&self) -> EngineCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
