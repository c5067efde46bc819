//! Job execution -- drives one task from `pending` to a terminal status.
//!
//! Split into focused submodules:
//! - [`context`] - Shared state and terminal-state helpers
//! - [`orchestration`] - Top-level job lifecycle
//! - [`progress`] - Bridge from engine progress callbacks into the registry

mod context;
mod orchestration;
mod progress;


pub(crate) use context::JobContext;
pub(crate) use orchestration::run_job;
