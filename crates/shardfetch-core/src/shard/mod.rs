//! Shard allocator: bounded-capacity output folders and the artifact -> shard mapping.
//!
//! The mapping file is the only source of truth for shard membership. The
//! allocator's position (`current_index`, `current_count`) is derived from it on
//! open and after reconciliation, never persisted separately.

mod commit;
mod naming;
mod organize;
mod persist;
mod reconcile;

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::layout::RunLayout;

pub use commit::CommitError;
pub use naming::{
    artifact_filename, artifact_id, is_shard_of, parse_ordinal, shard_name, CANONICAL_EXT,
};
pub use organize::OrganizeReport;
pub use reconcile::ReconcileReport;

/// Artifact filename -> shard name.
pub type ShardMapping = BTreeMap<String, String>;

/// Where the next artifact goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardPosition {
    /// 1-based ordinal of the current shard.
    pub index: u32,
    /// Artifacts already in the current shard.
    pub count: usize,
}

/// Derive the allocator position from existing mapping values.
///
/// Resumes at the highest ordinal if it has spare capacity, otherwise at the
/// next one. Names without an ordinal are ignored. Empty mapping → shard 1.
pub fn recover_position<'a>(
    shard_names: impl IntoIterator<Item = &'a String>,
    capacity: usize,
) -> ShardPosition {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for name in shard_names {
        if let Some(idx) = parse_ordinal(name) {
            *counts.entry(idx).or_insert(0) += 1;
        }
    }
    match counts.iter().next_back() {
        None => ShardPosition { index: 1, count: 0 },
        Some((&max_index, &last_count)) if last_count >= capacity => ShardPosition {
            index: max_index + 1,
            count: 0,
        },
        Some((&max_index, &last_count)) => ShardPosition {
            index: max_index,
            count: last_count,
        },
    }
}

struct AllocState {
    mapping: ShardMapping,
    /// Id -> artifact filename, kept in step with `mapping`.
    by_id: HashMap<String, String>,
    position: ShardPosition,
}

impl AllocState {
    fn new(mapping: ShardMapping, position: ShardPosition) -> Self {
        let mut state = Self {
            mapping: ShardMapping::new(),
            by_id: HashMap::with_capacity(mapping.len()),
            position,
        };
        for (name, shard) in mapping {
            state.insert(name, shard);
        }
        state
    }

    /// Add a mapping entry. A canonical `<id>.mp4` name wins the index slot.
    fn insert(&mut self, filename: String, shard: String) {
        let id = artifact_id(&filename).to_string();
        let canonical = filename == artifact_filename(&id);
        match self.by_id.get(&id) {
            Some(existing) if !canonical && *existing == artifact_filename(&id) => {}
            _ => {
                self.by_id.insert(id, filename.clone());
            }
        }
        self.mapping.insert(filename, shard);
    }
}

/// Assigns committed artifacts to shard folders under one lock.
pub struct ShardAllocator {
    prefix: String,
    capacity: usize,
    shard_root: PathBuf,
    mapping_path: PathBuf,
    state: Mutex<AllocState>,
}

impl ShardAllocator {
    /// Load the mapping of `layout` (missing file = empty) and recover the position.
    pub fn open(layout: &RunLayout, prefix: &str, capacity: usize) -> Result<Self> {
        let mapping_path = layout.mapping_file();
        let mapping = persist::load_mapping(&mapping_path)?;
        Ok(Self::with_mapping(
            mapping,
            prefix,
            capacity,
            layout.shard_root(),
            mapping_path,
        ))
    }

    /// Build an allocator from an in-memory mapping.
    pub fn with_mapping(
        mapping: ShardMapping,
        prefix: &str,
        capacity: usize,
        shard_root: &Path,
        mapping_path: PathBuf,
    ) -> Self {
        let capacity = capacity.max(1);
        let position = recover_position(mapping.values(), capacity);
        tracing::debug!(
            entries = mapping.len(),
            shard = %shard_name(prefix, position.index),
            count = position.count,
            "shard allocator recovered"
        );
        Self {
            prefix: prefix.to_string(),
            capacity,
            shard_root: shard_root.to_path_buf(),
            mapping_path,
            state: Mutex::new(AllocState::new(mapping, position)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AllocState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn position(&self) -> ShardPosition {
        self.lock().position
    }

    /// Name of the shard the next artifact will be placed in.
    pub fn current_shard(&self) -> String {
        shard_name(&self.prefix, self.position().index)
    }

    pub fn len(&self) -> usize {
        self.lock().mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `staged` into the current shard and record it in the mapping.
    ///
    /// The shard dir is created on demand. When the shard reaches capacity the
    /// next allocation goes to a new shard. The mapping is only updated after a
    /// successful move; it is written to disk by [`ShardAllocator::persist`].
    pub fn allocate_and_commit(&self, id: &str, staged: &Path) -> Result<String, CommitError> {
        if !staged.is_file() {
            return Err(CommitError::StagedMissing(staged.to_path_buf()));
        }
        let filename = staged
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| artifact_filename(id));

        let mut state = self.lock();
        let shard = shard_name(&self.prefix, state.position.index);
        let shard_dir = self.shard_root.join(&shard);
        std::fs::create_dir_all(&shard_dir).map_err(|source| CommitError::CreateDir {
            path: shard_dir.clone(),
            source,
        })?;
        let dest = shard_dir.join(&filename);
        commit::move_file(staged, &dest).map_err(|source| CommitError::Move {
            from: staged.to_path_buf(),
            to: dest.clone(),
            source,
        })?;

        state.insert(filename, shard.clone());
        state.position.count += 1;
        if state.position.count >= self.capacity {
            state.position.index += 1;
            state.position.count = 0;
        }
        tracing::debug!(id, shard = %shard, "artifact committed");
        Ok(shard)
    }

    /// Write the full mapping to disk. The mapping is copied under the lock and
    /// written after it is released.
    pub fn persist(&self) -> Result<()> {
        let snapshot = self.lock().mapping.clone();
        persist::save_mapping(&self.mapping_path, &snapshot)
    }

    /// Shard holding the artifact of `id`, with the artifact's file name.
    pub fn lookup(&self, id: &str) -> Option<(String, String)> {
        let state = self.lock();
        let name = state.by_id.get(id)?;
        let shard = state.mapping.get(name)?;
        Some((name.clone(), shard.clone()))
    }

    /// Path where the artifact of `id` lives according to the mapping.
    pub fn artifact_path(&self, id: &str) -> Option<PathBuf> {
        self.lookup(id)
            .map(|(name, shard)| self.shard_root.join(shard).join(name))
    }

    /// Size of the committed artifact of `id` if the mapping has it and the file
    /// exists with at least `min_bytes`.
    pub fn existing_artifact(&self, id: &str, min_bytes: u64) -> Option<u64> {
        let path = self.artifact_path(id)?;
        let size = std::fs::metadata(&path).ok().filter(|m| m.is_file())?.len();
        (size >= min_bytes).then_some(size)
    }

    /// Number of artifacts per shard name.
    pub fn shard_counts(&self) -> BTreeMap<String, usize> {
        let state = self.lock();
        let mut counts = BTreeMap::new();
        for shard in state.mapping.values() {
            *counts.entry(shard.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Copy of the current mapping.
    pub fn mapping(&self) -> ShardMapping {
        self.lock().mapping.clone()
    }
}

#[cfg(test)]
mod tests;
