//! Media extraction engines
//!
//! The [`MediaEngine`] trait is the seam between the job orchestration core
//! and whatever actually talks to media sites. Two implementations ship:
//!
//! - [`YtDlpEngine`]: drives the external `yt-dlp` binary
//! - [`NoOpEngine`]: stub used when no binary is available
//!
//! Engines report progress through a [`ProgressReporter`], a synchronous
//! callback that never fails and tells the engine when to stop.
//!
//! ## Usage
//!
//! ```no_run
//! use mediasense::engine::{MediaEngine, YtDlpEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = YtDlpEngine::from_path().expect("yt-dlp binary not found");
//!     let info = engine.discover("https://example.com/watch?v=abc").await?;
//!     println!("{} ({})", info.title, info.duration);
//!     Ok(())
//! }
//! ```

mod noop;
mod parser;
mod traits;
mod ytdlp;

pub use noop::NoOpEngine;
pub use parser::{format_duration, format_size};
pub use traits::{
    EngineCapabilities, MediaEngine, ProgressEvent, ProgressReporter, TransferRequest,
};
pub use ytdlp::YtDlpEngine;
