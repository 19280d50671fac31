//! Shard and artifact names.

use std::path::Path;

/// Container extension every committed artifact ends up with.
pub const CANONICAL_EXT: &str = "mp4";

/// `<prefix>-NNN`, 1-based ordinal, zero-padded to three digits.
pub fn shard_name(prefix: &str, ordinal: u32) -> String {
    format!("{prefix}-{ordinal:03}")
}

/// Ordinal of a shard name: the digits after the last `-`.
pub fn parse_ordinal(name: &str) -> Option<u32> {
    let (_, digits) = name.rsplit_once('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// True if `name` is a shard directory name for `prefix`.
pub fn is_shard_of(prefix: &str, name: &str) -> bool {
    match name.rsplit_once('-') {
        Some((p, _)) => p == prefix && parse_ordinal(name).is_some(),
        None => false,
    }
}

/// File name of a committed artifact: `<id>.mp4`.
pub fn artifact_filename(id: &str) -> String {
    format!("{id}.{CANONICAL_EXT}")
}

/// Id an artifact file name belongs to (its stem).
pub fn artifact_id(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}
