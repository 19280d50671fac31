//! Sorting an existing flat folder of artifacts into shard folders.

use anyhow::{bail, Context, Result};
use std::path::Path;

use super::{artifact_id, is_shard_of, ShardAllocator};

/// Outcome of [`ShardAllocator::organize_dir`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    /// Files moved into a shard.
    pub moved: usize,
    /// Files left in place because the mapping already has that name.
    pub already_mapped: Vec<String>,
}

fn is_candidate(name: &str) -> bool {
    !name.starts_with('.') && !name.ends_with(".part") && !name.ends_with(".ytdl")
}

impl ShardAllocator {
    /// Move every regular file of `src` (sorted by name) into shard folders,
    /// continuing from the current position. The mapping is persisted at the end.
    ///
    /// `progress` is called every `report_every` moved files with the running count.
    pub fn organize_dir(
        &self,
        src: &Path,
        report_every: usize,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<OrganizeReport> {
        if !src.is_dir() {
            bail!("source folder does not exist: {}", src.display());
        }
        if let Some(name) = src.file_name().and_then(|n| n.to_str()) {
            if is_shard_of(&self.prefix, name) {
                bail!("{} is already a shard folder", src.display());
            }
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(src).with_context(|| format!("list {}", src.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_candidate(name) {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        let total = files.len();
        tracing::info!(src = %src.display(), files = total, "organizing folder into shards");

        let mut report = OrganizeReport::default();
        let mut failure = None;
        for name in files {
            if self.lock().mapping.contains_key(&name) {
                tracing::warn!(file = %name, "already in the shard mapping, left in place");
                report.already_mapped.push(name);
                continue;
            }
            if let Err(e) = self.allocate_and_commit(artifact_id(&name), &src.join(&name)) {
                failure = Some(e);
                break;
            }
            report.moved += 1;
            if report_every > 0 && report.moved % report_every == 0 {
                progress(report.moved, total);
            }
        }
        // Files moved before a failure must still be mapped.
        self.persist()?;
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(report),
        }
    }
}
