//! On-disk progress snapshot and error list.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::layout::write_atomic;

/// Counters as written to `download_progress.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub success: u64,
    /// All non-success outcomes, including timeouts and unavailable items.
    pub failed: u64,
    pub skipped: u64,
    pub timeout: u64,
    pub unavailable: u64,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub bytes_per_sec: f64,
}

/// Informational run state; the ledger stays authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Unix seconds.
    pub last_update: u64,
    pub stats: SnapshotStats,
    /// Most recent `(id, reason)` pairs, oldest first.
    pub errors: Vec<(String, String)>,
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl ProgressSnapshot {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
            .with_context(|| format!("write progress snapshot: {}", path.display()))
    }

    /// Last snapshot at `path`, or `None` if there is none yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read snapshot: {}", path.display()))
            }
        };
        let snapshot = serde_json::from_str(&data)
            .with_context(|| format!("parse snapshot: {}", path.display()))?;
        Ok(Some(snapshot))
    }
}

/// Write `id<TAB>reason` lines to `path`. An empty list removes a file left
/// by an earlier run.
pub fn write_error_list(path: &Path, errors: &[(String, String)]) -> Result<usize> {
    if errors.is_empty() {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed stale error list"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("remove error list: {}", path.display()))
            }
        }
        return Ok(0);
    }
    let mut out = String::new();
    for (id, reason) in errors {
        out.push_str(id);
        out.push('\t');
        out.push_str(reason);
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())
        .with_context(|| format!("write error list: {}", path.display()))?;
    Ok(errors.len())
}
