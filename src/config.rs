//! Configuration types for mediasense

use crate::error::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Artifact storage configuration (directories and retention)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory holding one subdirectory per task (default: "./temp_downloads")
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// How long a finished task's artifact stays fetchable (default: 300 seconds)
    #[serde(default = "default_retention", with = "duration_serde")]
    pub retention: Duration,

    /// Run the janitor that reclaims expired task directories (default: true)
    #[serde(default = "default_true")]
    pub janitor_enabled: bool,

    /// How often the janitor sweeps (default: 60 seconds)
    #[serde(default = "default_janitor_interval", with = "duration_serde")]
    pub janitor_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            retention: default_retention(),
            janitor_enabled: true,
            janitor_interval: default_janitor_interval(),
        }
    }
}

/// Extraction engine configuration (yt-dlp binary, credentials, proxy)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Socket timeout passed to the engine (default: 10 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Cookie blob, either raw Netscape cookie-file text or its base64 encoding
    #[serde(default)]
    pub cookies: Option<String>,

    /// Outbound proxy URL (e.g. "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            search_path: true,
            socket_timeout: default_socket_timeout(),
            cookies: None,
            proxy: None,
        }
    }
}

impl EngineConfig {
    /// Decoded cookie-file contents, if a cookie blob is configured
    ///
    /// A blob that decodes as base64 to UTF-8 text is used decoded; anything
    /// else is used verbatim.
    pub fn cookie_file_contents(&self) -> Option<String> {
        let blob = self.cookies.as_deref()?.trim();
        if blob.is_empty() {
            return None;
        }

        let contents = match base64::engine::general_purpose::STANDARD
            .decode(blob)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            Some(decoded) => decoded,
            None => blob.to_string(),
        };

        if !looks_like_netscape_cookies(&contents) {
            tracing::warn!(
                length = contents.len(),
                "cookie blob does not look like a Netscape cookie file"
            );
        }

        Some(contents)
    }
}

fn looks_like_netscape_cookies(contents: &str) -> bool {
    contents.contains("# Netscape HTTP Cookie File") || contents.contains('\t')
}

/// Job execution configuration (concurrency and deadlines)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum concurrent transfers (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Maximum wall-clock duration of one transfer (default: 1 hour, None = unlimited)
    #[serde(default = "default_max_task_duration", with = "optional_duration_serde")]
    pub max_task_duration: Option<Duration>,

    /// How long shutdown waits for active jobs to drain (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent(),
            max_task_duration: default_max_task_duration(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:8000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: local frontend and API origins)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

/// Main configuration for [`MediaService`](crate::MediaService)
///
/// Fields are organized into logical sub-configs:
/// - [`storage`](StorageConfig) - base directory, retention, janitor
/// - [`engine`](EngineConfig) - yt-dlp binary, cookies, proxy
/// - [`jobs`](JobConfig) - concurrency and deadlines
/// - [`api`](ApiConfig) - REST server
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Artifact storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Extraction engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Job execution settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Base directory for task storage
    pub fn base_dir(&self) -> &PathBuf {
        &self.storage.base_dir
    }

    /// Check settings that would otherwise fail at runtime
    pub fn validate(&self) -> Result<()> {
        if self.storage.base_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "base directory must not be empty".into(),
                key: Some("storage.base_dir".into()),
            });
        }

        if self.storage.janitor_interval.is_zero() {
            return Err(Error::Config {
                message: "janitor interval must be greater than zero".into(),
                key: Some("storage.janitor_interval".into()),
            });
        }

        if self.jobs.max_concurrent_jobs == 0 {
            return Err(Error::Config {
                message: "at least one concurrent job is required".into(),
                key: Some("jobs.max_concurrent_jobs".into()),
            });
        }

        if let Some(limit) = self.jobs.max_task_duration
            && limit.is_zero()
        {
            return Err(Error::Config {
                message: "maximum task duration must be greater than zero".into(),
                key: Some("jobs.max_task_duration".into()),
            });
        }

        if let Some(proxy) = &self.engine.proxy
            && url::Url::parse(proxy).is_err()
        {
            return Err(Error::Config {
                message: format!("invalid proxy URL: {proxy}"),
                key: Some("engine.proxy".into()),
            });
        }

        Ok(())
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("./temp_downloads")
}

fn default_retention() -> Duration {
    Duration::from_secs(300)
}

fn default_janitor_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_concurrent() -> usize {
    3
}

fn default_max_task_duration() -> Option<Duration> {
    Some(Duration::from_secs(60 * 60))
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8000))
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://localhost:8000".into(),
        "http://127.0.0.1:3000".into(),
        "http://127.0.0.1:8000".into(),
    ]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
