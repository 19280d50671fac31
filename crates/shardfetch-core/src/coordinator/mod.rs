//! Concurrency coordinator: a bounded pool of fetch workers over the pending
//! queue, feeding the shard allocator and the ledger.
//!
//! Per item: `Pending -> Dispatched -> {Succeeded, TimedOut, Unavailable, Failed} -> Recorded`.

mod context;
mod run;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::progress::RunCounters;
use crate::shard::ReconcileReport;

pub use context::RunContext;
pub use run::run_pipeline;

/// When to stop dispatching before the queue is empty. Either bound may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopTarget {
    pub successes: Option<u64>,
    pub bytes: Option<u64>,
}

impl StopTarget {
    pub fn is_set(&self) -> bool {
        self.successes.is_some() || self.bytes.is_some()
    }

    pub fn reached(&self, counters: &RunCounters) -> bool {
        self.successes.is_some_and(|n| counters.success >= n)
            || self.bytes.is_some_and(|b| counters.total_bytes >= b)
    }
}

/// Options for one run; usually built from [`FetchConfig`] and CLI overrides.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workers: usize,
    pub timeout: Duration,
    pub target: StopTarget,
    /// Skip this many leading items of the input list (after dedup).
    pub start: usize,
    /// Dispatch at most this many items.
    pub limit: Option<usize>,
    /// Also dispatch ids that failed in an earlier run.
    pub retry_failed: bool,
    pub min_artifact_bytes: u64,
    pub progress_every: u64,
    pub snapshot_every: u64,
}

impl RunOptions {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            workers: cfg.workers,
            timeout: Duration::from_secs(cfg.timeout_secs),
            target: StopTarget::default(),
            start: 0,
            limit: None,
            retry_failed: cfg.retry_failed,
            min_artifact_bytes: cfg.min_artifact_bytes,
            progress_every: cfg.progress_every,
            snapshot_every: cfg.snapshot_every,
        }
    }
}

/// Why a run ended with work left in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TargetReached,
}

/// End-of-run report.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub counters: RunCounters,
    /// Fetches handed to a worker.
    pub dispatched: usize,
    /// Items never dispatched; they stay pending.
    pub undispatched: usize,
    pub shard_counts: BTreeMap<String, usize>,
    pub reconcile: ReconcileReport,
    pub stopped: Option<StopReason>,
    pub elapsed_secs: f64,
}
