//! Startup reconciliation of shard directories against the mapping.
//!
//! A crash between moving an artifact into a shard and persisting the mapping
//! leaves a file the mapping does not know about. Such files are adopted into
//! the mapping; entries whose file is gone are only reported.

use anyhow::{Context, Result};

use super::{is_shard_of, recover_position, ShardAllocator};

/// Outcome of [`ShardAllocator::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Artifact filenames found on disk and added to the mapping.
    pub adopted: Vec<String>,
    /// Mapping entries whose file does not exist.
    pub missing: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.adopted.is_empty() && self.missing.is_empty()
    }
}

fn is_artifact_name(name: &str) -> bool {
    !name.starts_with('.') && !name.ends_with(".part") && !name.ends_with(".tmp")
}

impl ShardAllocator {
    /// Scan `<prefix>-NNN` directories under the shard root, adopt unmapped
    /// files, report mapped files that are missing, and recompute the position.
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let mut on_disk: Vec<(String, String)> = Vec::new();
        let entries = match std::fs::read_dir(&self.shard_root) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ReconcileReport::default())
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("list shard root: {}", self.shard_root.display()))
            }
        };
        for entry in entries {
            let entry = entry?;
            let Some(dir_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !entry.file_type()?.is_dir() || !is_shard_of(&self.prefix, &dir_name) {
                continue;
            }
            for file in std::fs::read_dir(entry.path())? {
                let file = file?;
                if !file.file_type()?.is_file() {
                    continue;
                }
                if let Some(name) = file.file_name().to_str() {
                    if is_artifact_name(name) {
                        on_disk.push((name.to_string(), dir_name.clone()));
                    }
                }
            }
        }
        on_disk.sort();

        let mut report = ReconcileReport::default();
        let mut state = self.lock();
        for (name, shard) in on_disk {
            if !state.mapping.contains_key(&name) {
                tracing::warn!(file = %name, shard = %shard, "adopting unmapped artifact");
                state.insert(name.clone(), shard);
                report.adopted.push(name);
            }
        }
        for (name, shard) in &state.mapping {
            if !self.shard_root.join(shard).join(name).is_file() {
                report.missing.push(name.clone());
            }
        }
        if !report.missing.is_empty() {
            tracing::warn!(
                count = report.missing.len(),
                "mapping entries without a file on disk"
            );
        }
        let position = recover_position(state.mapping.values(), self.capacity);
        state.position = position;
        Ok(report)
    }
}
