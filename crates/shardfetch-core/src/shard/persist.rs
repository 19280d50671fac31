//! Persist the shard mapping as one JSON object, rewritten in full.

use anyhow::{Context, Result};
use std::path::Path;

use super::ShardMapping;

/// Load the mapping. A missing file is an empty mapping; an unreadable or
/// invalid file is an error (it is the only record of shard membership).
pub(super) fn load_mapping(path: &Path) -> Result<ShardMapping> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ShardMapping::new()),
        Err(e) => return Err(e).with_context(|| format!("read shard mapping: {}", path.display())),
    };
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse shard mapping: {}", path.display()))
}

pub(super) fn save_mapping(path: &Path, mapping: &ShardMapping) -> Result<()> {
    let json = serde_json::to_string_pretty(mapping).context("serialize shard mapping")?;
    crate::layout::write_atomic(path, json.as_bytes())
        .with_context(|| format!("write shard mapping: {}", path.display()))?;
    Ok(())
}
