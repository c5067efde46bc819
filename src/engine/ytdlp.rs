//! Engine backed by the external yt-dlp binary

use super::parser::{is_status_line, parse_media_info, parse_progress_line};
use super::traits::{EngineCapabilities, MediaEngine, ProgressReporter, TransferRequest};
use crate::error::{Error, ExtractionError};
use crate::types::MediaInfo;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

const STDERR_TAIL_LINES: usize = 20;
const COOKIE_FILE_NAME: &str = ".cookies.txt";

/// Engine that shells out to `yt-dlp`
///
/// # Examples
///
/// ```no_run
/// use mediasense::engine::{MediaEngine, YtDlpEngine};
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let engine = YtDlpEngine::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found in PATH");
/// assert_eq!(engine.name(), "yt-dlp");
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary_path: PathBuf,
    socket_timeout: Duration,
    cookies: Option<String>,
    proxy: Option<String>,
}

impl YtDlpEngine {
    /// Create an engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self {
            binary_path,
            socket_timeout: Duration::from_secs(10),
            cookies: None,
            proxy: None,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Socket timeout passed to every invocation
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    /// Cookies and proxy used for discovery requests
    ///
    /// Transfers take theirs from the [`TransferRequest`].
    pub fn with_network(mut self, cookies: Option<String>, proxy: Option<String>) -> Self {
        self.cookies = cookies;
        self.proxy = proxy;
        self
    }

    /// Path of the binary this engine runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn discover_args(&self, url: &str, cookie_file: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--dump-single-json".into(),
            "--no-playlist".into(),
            "--skip-download".into(),
            "--socket-timeout".into(),
            self.socket_timeout.as_secs().to_string().into(),
        ];
        push_network_args(&mut args, cookie_file, self.proxy.as_deref());
        args.push("--".into());
        args.push(url.into());
        args
    }

    fn transfer_args(&self, request: &TransferRequest, cookie_file: Option<&Path>) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--newline".into(),
            "--progress".into(),
            "--no-playlist".into(),
            "-f".into(),
            request.format.engine_selector().into(),
            "-P".into(),
            request.output_dir.clone().into_os_string(),
            "-o".into(),
            "%(title)s.%(ext)s".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "--socket-timeout".into(),
            self.socket_timeout.as_secs().to_string().into(),
        ];
        push_network_args(&mut args, cookie_file, request.proxy.as_deref());
        args.push("--".into());
        args.push(request.url.clone().into());
        args
    }
}

fn push_network_args(args: &mut Vec<OsString>, cookie_file: Option<&Path>, proxy: Option<&str>) {
    if let Some(path) = cookie_file {
        args.push("--cookies".into());
        args.push(path.as_os_str().to_owned());
    }
    if let Some(proxy) = proxy {
        args.push("--proxy".into());
        args.push(proxy.into());
    }
}

/// Cookie file that is deleted when dropped
struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    async fn write(path: PathBuf, contents: &str) -> crate::Result<Self> {
        tokio::fs::write(&path, contents).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(Self { path })
    }
}

impl Drop for CookieFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = ?self.path, error = %e, "failed to remove cookie file");
        }
    }
}

/// Pick the most useful error line from stderr
fn failure_message(tail: &VecDeque<String>, status: std::process::ExitStatus) -> String {
    tail.iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| tail.back())
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| format!("yt-dlp exited with {status}"))
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    async fn discover(&self, url: &str) -> crate::Result<MediaInfo> {
        let cookie_file = match &self.cookies {
            Some(contents) => {
                let path = std::env::temp_dir()
                    .join(format!("mediasense-{}{}", uuid::Uuid::new_v4(), COOKIE_FILE_NAME));
                Some(CookieFile::write(path, contents).await?)
            }
            None => None,
        };

        let output = Command::new(&self.binary_path)
            .args(self.discover_args(url, cookie_file.as_ref().map(|c| c.path.as_path())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: VecDeque<String> = stderr
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect();
            return Err(ExtractionError::DiscoverFailed(failure_message(&tail, output.status)).into());
        }

        Ok(parse_media_info(&output.stdout)?)
    }

    async fn transfer(
        &self,
        request: TransferRequest,
        reporter: ProgressReporter,
    ) -> crate::Result<PathBuf> {
        let cookie_file = match &request.cookies {
            Some(contents) => {
                Some(CookieFile::write(request.output_dir.join(COOKIE_FILE_NAME), contents).await?)
            }
            None => None,
        };

        let mut child = Command::new(&self.binary_path)
            .args(self.transfer_args(&request, cookie_file.as_ref().map(|c| c.path.as_path())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stderr not captured".into()))?;

        // In --print mode progress goes to stderr, so both streams are scanned.
        let stderr_reporter = reporter.clone();
        let stderr_task = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_progress_line(&line) {
                    let _ = stderr_reporter.report(event);
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut printed_path: Option<PathBuf> = None;

        let read_result: crate::Result<()> = loop {
            tokio::select! {
                _ = reporter.cancelled() => break Err(ExtractionError::Cancelled.into()),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(event) = parse_progress_line(&line) {
                            if reporter.report(event).is_break() {
                                break Err(ExtractionError::Cancelled.into());
                            }
                        } else if !line.trim().is_empty() && !is_status_line(&line) {
                            printed_path = Some(PathBuf::from(line.trim()));
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(Error::ExternalTool(format!("Failed to read yt-dlp output: {}", e))),
                }
            }
        };

        if let Err(e) = read_result {
            if let Err(kill_err) = child.kill().await {
                tracing::warn!(error = %kill_err, "failed to kill yt-dlp");
            }
            stderr_task.abort();
            drop(cookie_file);
            return Err(e);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to wait for yt-dlp: {}", e)))?;
        let tail = stderr_task.await.unwrap_or_default();
        drop(cookie_file);

        if reporter.is_cancelled() {
            return Err(ExtractionError::Cancelled.into());
        }

        if !status.success() {
            return Err(ExtractionError::TransferFailed(failure_message(&tail, status)).into());
        }

        let path = printed_path.ok_or_else(|| ExtractionError::NoOutput {
            dir: request.output_dir.clone(),
        })?;

        Ok(if path.is_relative() {
            request.output_dir.join(path)
        } else {
            path
        })
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_discover: true,
            can_transfer: true,
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
