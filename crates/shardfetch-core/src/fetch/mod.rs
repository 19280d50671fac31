//! Fetch worker: one external download per work item, with a timeout,
//! artifact validation and outcome classification.
//!
//! The coordinator only sees [`Fetcher`] and [`FetchOutcome`]; the process
//! based implementation lives in [`YtDlpFetcher`].

mod classify;
pub mod process;
pub mod staging;
mod ytdlp;

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::work::WorkItem;

pub use classify::{is_unavailable, summarize_stderr};
pub use ytdlp::{format_selector, YtDlpFetcher};

/// One fetch to perform.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub item: WorkItem,
    /// Directory the artifact is downloaded into before it is committed to a shard.
    pub staging_dir: PathBuf,
    pub timeout: Duration,
}

/// Terminal result of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A valid artifact, already normalized to `<id>.mp4`, sits at `path`.
    Success { path: PathBuf, size_bytes: u64 },
    /// The process exceeded its timeout; staging files for the id were removed.
    Timeout,
    /// The content is permanently unavailable (private, removed, ...).
    Unavailable(String),
    /// Anything else: download error, artifact too small, probe rejection.
    Failed(String),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    /// Reason recorded in the failed log; `None` for success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Timeout => Some("timeout".to_string()),
            FetchOutcome::Unavailable(msg) => Some(format!("unavailable: {msg}")),
            FetchOutcome::Failed(msg) => Some(format!("failed: {msg}")),
        }
    }
}

/// Performs fetches for the coordinator. Implementations must confine their
/// side effects to `request.staging_dir`.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = FetchOutcome> + Send;
}
