//! Progress reporting for a run: counters, recent errors, rate and ETA.
//!
//! Lock order: a task holds at most one of the ledger, allocator and reporter
//! locks at any time. The reporter never calls into the other two while its
//! own lock is held; callers gather what they need (e.g. the current shard
//! fill) before asking for a progress line.

mod snapshot;

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

pub use snapshot::{write_error_list, ProgressSnapshot, SnapshotStats};

const MIB: f64 = 1_048_576.0;

/// Kind of non-success outcome, for the per-kind counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Unavailable,
    Other,
}

/// Raw counters for the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    pub timeout: u64,
    pub unavailable: u64,
    pub total_bytes: u64,
}

impl RunCounters {
    /// Items with a terminal record this run.
    pub fn recorded(&self) -> u64 {
        self.success + self.failed + self.skipped
    }
}

#[derive(Debug, Default)]
struct ReporterState {
    counters: RunCounters,
    recent: VecDeque<(String, String)>,
}

/// Shard fill shown on the progress line.
#[derive(Debug, Clone)]
pub struct ShardFill {
    pub shard: String,
    pub count: usize,
    pub capacity: usize,
}

pub struct ProgressReporter {
    started: Instant,
    recent_cap: usize,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    /// `recent_cap`: how many recent errors the snapshot keeps.
    pub fn new(recent_cap: usize) -> Self {
        Self {
            started: Instant::now(),
            recent_cap,
            state: Mutex::new(ReporterState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the number of items recorded so far, including this one.
    pub fn record_success(&self, bytes: u64) -> u64 {
        let mut state = self.lock();
        state.counters.success += 1;
        state.counters.total_bytes += bytes;
        state.counters.recorded()
    }

    /// An item already present in a shard and recorded without fetching.
    pub fn record_skipped(&self) -> u64 {
        let mut state = self.lock();
        state.counters.skipped += 1;
        state.counters.recorded()
    }

    pub fn record_failure(&self, id: &str, kind: FailureKind, reason: &str) -> u64 {
        let mut state = self.lock();
        state.counters.failed += 1;
        match kind {
            FailureKind::Timeout => state.counters.timeout += 1,
            FailureKind::Unavailable => state.counters.unavailable += 1,
            FailureKind::Other => {}
        }
        if self.recent_cap > 0 {
            while state.recent.len() >= self.recent_cap {
                state.recent.pop_front();
            }
            state.recent.push_back((id.to_string(), reason.to_string()));
        }
        state.counters.recorded()
    }

    pub fn counters(&self) -> RunCounters {
        self.lock().counters
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn recent_errors(&self) -> Vec<(String, String)> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let (counters, errors) = {
            let state = self.lock();
            (state.counters, state.recent.iter().cloned().collect())
        };
        let elapsed_secs = self.elapsed_secs();
        ProgressSnapshot {
            last_update: snapshot::unix_now(),
            stats: SnapshotStats {
                success: counters.success,
                failed: counters.failed,
                skipped: counters.skipped,
                timeout: counters.timeout,
                unavailable: counters.unavailable,
                total_bytes: counters.total_bytes,
                elapsed_secs,
                bytes_per_sec: rate(counters.total_bytes as f64, elapsed_secs),
            },
            errors,
        }
    }

    /// One human-readable progress line. `total` is the number of items this
    /// run intends to record.
    pub fn progress_line(&self, total: u64, fill: &ShardFill) -> String {
        let counters = self.counters();
        format_progress_line(&counters, total, fill, self.elapsed_secs())
    }
}

fn rate(amount: f64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        0.0
    } else {
        amount / elapsed_secs
    }
}

/// `1h02m03s`, `4m05s`, `9s`.
pub fn format_secs(secs: f64) -> String {
    let total = secs.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Estimated seconds until `total` items are recorded, from the item rate so far.
pub fn eta_secs(recorded: u64, total: u64, elapsed_secs: f64) -> Option<f64> {
    let remaining = total.saturating_sub(recorded);
    if remaining == 0 {
        return Some(0.0);
    }
    let per_sec = rate(recorded as f64, elapsed_secs);
    if per_sec <= 0.0 {
        return None;
    }
    Some(remaining as f64 / per_sec)
}

pub fn format_progress_line(
    counters: &RunCounters,
    total: u64,
    fill: &ShardFill,
    elapsed_secs: f64,
) -> String {
    let recorded = counters.recorded();
    let mib = counters.total_bytes as f64 / MIB;
    let rate_mib = rate(mib, elapsed_secs);
    let eta = eta_secs(recorded, total, elapsed_secs)
        .map(format_secs)
        .unwrap_or_else(|| "?".to_string());
    format!(
        "[{}/{}] ok {}  failed {} (timeout {}, unavailable {})  skipped {}  {:.1} MiB  {:.2} MiB/s  {} {}/{}  elapsed {}  ETA {}",
        recorded,
        total,
        counters.success,
        counters.failed,
        counters.timeout,
        counters.unavailable,
        counters.skipped,
        mib,
        rate_mib,
        fill.shard,
        fill.count,
        fill.capacity,
        format_secs(elapsed_secs),
        eta
    )
}
