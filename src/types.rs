//! Core types for mediasense

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a download task
///
/// Also names the task's storage directory, so registry and storage stay
/// correlated without a second lookup table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh random (v4) identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> Uuid {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, waiting for a worker
    Pending,
    /// Transfer in progress
    Processing,
    /// Artifact stored and ready to fetch
    Completed,
    /// Failed with error
    Failed,
}

impl TaskStatus {
    /// Whether the status has no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task ended in [`TaskStatus::Failed`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Storage, engine or filesystem error
    Error,
    /// Cancelled by a caller or by shutdown
    Cancelled,
    /// Exceeded the configured maximum task duration
    TimedOut,
}

/// Point-in-time snapshot of a task
///
/// Returned by value from the registry; holding one never blocks writers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaskInfo {
    /// Task ID
    pub id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Progress percentage (0.0 to 100.0)
    pub progress: f32,
    /// Name of the produced file (completed tasks only)
    pub filename: Option<String>,
    /// Location of the produced file (completed tasks only)
    #[schema(value_type = Option<String>)]
    pub filepath: Option<PathBuf>,
    /// Human-readable error (failed tasks only)
    pub error: Option<String>,
    /// Failure classification (failed tasks only)
    pub failure_kind: Option<FailureKind>,
    /// Source URL
    pub url: String,
    /// Requested format selector
    pub format_id: String,
    /// When the task was submitted
    pub created_at: DateTime<Utc>,
    /// When the transfer started
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether the artifact directory has been reclaimed by the janitor
    #[serde(default)]
    pub reclaimed: bool,
}

impl TaskInfo {
    /// Fresh `pending` record
    pub(crate) fn pending(id: TaskId, url: String, format_id: String) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0.0,
            filename: None,
            filepath: None,
            error: None,
            failure_kind: None,
            url,
            format_id,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            reclaimed: false,
        }
    }
}

/// Engine format selector
///
/// `"best"` is reserved and lets the engine pick the best combined
/// video+audio; anything else is passed through verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FormatSelector {
    /// Best available video+audio
    Best,
    /// Engine-specific format id
    Specific(String),
}

impl FormatSelector {
    /// Wire value of the reserved sentinel
    pub const BEST: &'static str = "best";

    /// Parse a caller-supplied format id
    pub fn parse(format_id: &str) -> Self {
        let trimmed = format_id.trim();
        if trimmed.is_empty() || trimmed == Self::BEST {
            FormatSelector::Best
        } else {
            FormatSelector::Specific(trimmed.to_string())
        }
    }

    /// Selector string understood by yt-dlp's `-f` option
    pub fn engine_selector(&self) -> &str {
        match self {
            FormatSelector::Best => "bestvideo+bestaudio/best",
            FormatSelector::Specific(id) => id,
        }
    }
}

impl std::fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatSelector::Best => f.write_str(Self::BEST),
            FormatSelector::Specific(id) => f.write_str(id),
        }
    }
}

/// Kind of a discovered format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Engine-selected best video+audio
    Best,
    /// Video stream (may or may not carry audio)
    Video,
    /// Audio-only stream
    Audio,
}

/// A downloadable format offered for a URL
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaFormat {
    /// Resolution label ("720p", "Audio", "Best Quality")
    pub resolution: String,
    /// Container extension
    pub ext: String,
    /// Human-readable approximate size
    pub size: String,
    /// Opaque engine format id
    pub format_id: String,
    /// Format kind
    #[serde(rename = "type")]
    pub kind: FormatKind,
}

/// Discovery result for a URL
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// Media title
    pub title: String,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    /// Formatted duration ("m:ss" or "h:mm:ss")
    pub duration: String,
    /// Extractor / platform identifier
    pub platform: Option<String>,
    /// Available formats, best first
    pub formats: Vec<MediaFormat>,
}

/// Download submission
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Source URL
    pub url: String,
    /// Format id from discovery, or "best"
    #[serde(default = "default_format_id")]
    pub format_id: String,
}

fn default_format_id() -> String {
    FormatSelector::BEST.to_string()
}

/// Immediate answer to a submission
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitResponse {
    /// ID to poll
    pub task_id: TaskId,
    /// Always `pending`
    pub status: TaskStatus,
}

/// Engine capability summary for the capabilities endpoint
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    /// Engine name
    pub engine: String,
    /// Whether format discovery is available
    pub can_discover: bool,
    /// Whether transfers are available
    pub can_transfer: bool,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task created
    Queued {
        /// Task ID
        id: TaskId,
        /// Source URL
        url: String,
    },

    /// Transfer started
    Processing {
        /// Task ID
        id: TaskId,
    },

    /// Progress update
    Progress {
        /// Task ID
        id: TaskId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// Artifact stored
    Completed {
        /// Task ID
        id: TaskId,
        /// Stored file name
        filename: String,
    },

    /// Task failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Failure classification
        kind: FailureKind,
        /// Error message
        error: String,
    },

    /// Artifact directory reclaimed by the janitor
    Reclaimed {
        /// Task ID
        id: TaskId,
    },

    /// Service is shutting down
    Shutdown,
}

impl Event {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            Event::Queued { .. } => "queued",
            Event::Processing { .. } => "processing",
            Event::Progress { .. } => "progress",
            Event::Completed { .. } => "completed",
            Event::Failed { .. } => "failed",
            Event::Reclaimed { .. } => "reclaimed",
            Event::Shutdown => "shutdown",
        }
    }
}
