//! Persistent work ledger: which ids are pending, completed or failed.
//!
//! Completed and failed ids live in append-only logs. The pending set is never
//! edited in place; it is recomputed as `all - completed - failed` on every call
//! to [`WorkLedger::pending`]. `pending.txt` is a materialized copy of that set,
//! written by [`WorkLedger::initialize`] for inspection and for later runs.
//!
//! A failed entry is terminal for the run that wrote it. A later run may retry
//! it ([`WorkLedger::unfinished`]); if it then succeeds the id counts as
//! completed only.

mod log;

use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::layout::RunLayout;

pub use log::{one_line_reason, FailedEntry, MAX_REASON_CHARS};

/// Counts shown by `status` and after `init`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct LedgerState {
    /// Every id known to this run, in input order.
    all_ids: Vec<String>,
    /// Ids that received a terminal entry during this run.
    recorded: HashSet<String>,
}

/// Work ledger backed by three text files under the run's logs dir.
pub struct WorkLedger {
    pending_path: PathBuf,
    completed_path: PathBuf,
    failed_path: PathBuf,
    state: Mutex<LedgerState>,
}

impl WorkLedger {
    /// Open the ledger of `layout`, creating the logs dir if needed. No ids are
    /// loaded until [`WorkLedger::initialize`].
    pub fn open(layout: &RunLayout) -> Result<Self> {
        std::fs::create_dir_all(&layout.logs_dir)?;
        Ok(Self {
            pending_path: layout.pending_log(),
            completed_path: layout.completed_log(),
            failed_path: layout.failed_log(),
            state: Mutex::new(LedgerState::default()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the id universe, write `pending.txt`, and return current counts.
    /// Absent logs (first run) count as empty.
    pub fn initialize(&self, all_ids: &[String]) -> Result<LedgerStats> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = all_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut state = self.lock();
        state.all_ids = ids;
        let (completed, failed) = self.terminal_sets()?;
        let pending: Vec<&String> = state
            .all_ids
            .iter()
            .filter(|id| !completed.contains(*id) && !failed.contains(*id))
            .collect();

        let mut body = String::new();
        for id in &pending {
            body.push_str(id);
            body.push('\n');
        }
        crate::layout::write_atomic(&self.pending_path, body.as_bytes())?;

        let stats = LedgerStats {
            pending: pending.len(),
            completed: completed.len(),
            failed: failed.difference(&completed).count(),
        };
        tracing::debug!(?stats, "ledger initialized");
        Ok(stats)
    }

    /// Ids listed in the materialized `pending.txt` (the universe of the last
    /// `initialize`, minus what was already finished at that time).
    pub fn materialized_pending(&self) -> Result<Vec<String>> {
        let _state = self.lock();
        Ok(log::read_lines(&self.pending_path)?
            .iter()
            .map(|l| log::id_of(l).to_string())
            .collect())
    }

    /// Pending ids in input order, recomputed from the persisted logs.
    pub fn pending(&self) -> Result<Vec<String>> {
        let state = self.lock();
        let (completed, failed) = self.terminal_sets()?;
        Ok(state
            .all_ids
            .iter()
            .filter(|id| !completed.contains(*id) && !failed.contains(*id))
            .cloned()
            .collect())
    }

    /// Ids without a completed entry, in input order: the pending ids plus the
    /// ids that failed in an earlier run. Ids recorded during this run are left out.
    pub fn unfinished(&self) -> Result<Vec<String>> {
        let state = self.lock();
        let (completed, _) = self.terminal_sets()?;
        Ok(state
            .all_ids
            .iter()
            .filter(|id| !completed.contains(*id) && !state.recorded.contains(*id))
            .cloned()
            .collect())
    }

    /// Record a successful item. Returns false (and writes nothing) if this id
    /// already got a terminal entry in this run.
    pub fn mark_completed(&self, id: &str) -> Result<bool> {
        let mut state = self.lock();
        if !state.recorded.insert(id.to_string()) {
            tracing::warn!(id, "ignoring second terminal entry (completed)");
            return Ok(false);
        }
        log::append_line(&self.completed_path, id)?;
        Ok(true)
    }

    /// Record a failed item as `id<TAB>reason`. Returns false (and writes nothing)
    /// if this id already got a terminal entry in this run.
    pub fn mark_failed(&self, id: &str, reason: &str) -> Result<bool> {
        let mut state = self.lock();
        if !state.recorded.insert(id.to_string()) {
            tracing::warn!(id, "ignoring second terminal entry (failed)");
            return Ok(false);
        }
        let line = format!("{}\t{}", id, one_line_reason(reason));
        log::append_line(&self.failed_path, &line)?;
        Ok(true)
    }

    /// Failed-log entries of ids that never completed, latest entry per id,
    /// in file order.
    pub fn failed_entries(&self) -> Result<Vec<FailedEntry>> {
        let _state = self.lock();
        let (completed, _) = self.terminal_sets()?;
        let entries: Vec<FailedEntry> = log::read_lines(&self.failed_path)?
            .iter()
            .map(|l| log::parse_failed(l))
            .filter(|e| !completed.contains(&e.id))
            .collect();
        let mut seen = HashSet::new();
        let mut latest: Vec<FailedEntry> = entries
            .into_iter()
            .rev()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        latest.reverse();
        Ok(latest)
    }

    /// Counts for `status`. Without an initialized universe, `pending.txt` is used.
    pub fn stats(&self) -> Result<LedgerStats> {
        let universe = {
            let state = self.lock();
            state.all_ids.clone()
        };
        let universe = if universe.is_empty() {
            self.materialized_pending()?
        } else {
            universe
        };
        let _state = self.lock();
        let (completed, failed) = self.terminal_sets()?;
        let pending = universe
            .iter()
            .filter(|id| !completed.contains(*id) && !failed.contains(*id))
            .count();
        Ok(LedgerStats {
            pending,
            completed: completed.len(),
            failed: failed.difference(&completed).count(),
        })
    }

    /// Distinct ids of the completed and failed logs. Caller holds the state lock.
    fn terminal_sets(&self) -> Result<(HashSet<String>, HashSet<String>)> {
        let completed = log::read_lines(&self.completed_path)?
            .iter()
            .map(|l| log::id_of(l).to_string())
            .collect();
        let failed = log::read_lines(&self.failed_path)?
            .iter()
            .map(|l| log::id_of(l).to_string())
            .collect();
        Ok((completed, failed))
    }
}

#[cfg(test)]
mod tests;
