//! Staging directory helpers: locate a fetched artifact, normalize it, clean up.

use std::io;
use std::path::{Path, PathBuf};

use crate::shard::{artifact_filename, CANONICAL_EXT};

/// Container extensions accepted from the downloader, in lookup order.
pub const ACCEPTED_EXTS: [&str; 3] = ["mp4", "mkv", "webm"];

/// Suffixes the downloader uses for in-progress files.
const PARTIAL_SUFFIXES: [&str; 2] = [".part", ".ytdl"];

/// First `<id>.<ext>` in `staging` (ext from [`ACCEPTED_EXTS`]) that is at least
/// `min_bytes` long, with its size. Smaller files are treated as not present.
pub fn find_artifact(staging: &Path, id: &str, min_bytes: u64) -> Option<(PathBuf, u64)> {
    ACCEPTED_EXTS.iter().find_map(|ext| {
        let path = staging.join(format!("{id}.{ext}"));
        let meta = std::fs::metadata(&path).ok()?;
        (meta.is_file() && meta.len() >= min_bytes).then(|| (path, meta.len()))
    })
}

/// Rename `found` to `<id>.mp4` in the same directory if it has another name.
/// An existing file at the canonical name is replaced.
pub fn normalize_extension(found: &Path, id: &str) -> io::Result<PathBuf> {
    let canonical = found
        .parent()
        .map(|dir| dir.join(artifact_filename(id)))
        .unwrap_or_else(|| PathBuf::from(artifact_filename(id)));
    if found == canonical {
        return Ok(canonical);
    }
    match std::fs::remove_file(&canonical) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::rename(found, &canonical)?;
    tracing::debug!(id, from = %found.display(), ext = CANONICAL_EXT, "normalized extension");
    Ok(canonical)
}

/// Remove every file in `staging` belonging to `id` (`<id>.*`: finished
/// containers, fragments, `.part`/`.ytdl` files). Returns how many were removed.
pub fn remove_item_files(staging: &Path, id: &str) -> usize {
    let prefix = format!("{id}.");
    let Ok(entries) = std::fs::read_dir(staging) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && std::fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!(id, removed, "removed staging files");
    }
    removed
}

/// Remove leftover in-progress files from an earlier, interrupted run.
pub fn sweep_partials(staging: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(staging) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let is_partial = name
            .to_str()
            .map(|n| PARTIAL_SUFFIXES.iter().any(|s| n.ends_with(s)))
            .unwrap_or(false);
        if is_partial && entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Remove `staging` if it is empty. Returns true if it was removed.
pub fn remove_dir_if_empty(staging: &Path) -> bool {
    let empty = std::fs::read_dir(staging)
        .map(|mut e| e.next().is_none())
        .unwrap_or(false);
    empty && std::fs::remove_dir(staging).is_ok()
}
