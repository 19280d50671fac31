//! On-disk layout of a download run, relative to one root directory.

use std::path::{Path, PathBuf};

/// Directory holding ledger logs, shard mapping and progress snapshot.
pub const LOG_DIR: &str = "download_logs";

/// Paths used by a run. Shards live directly under `root`; staging is a hidden
/// sibling so a commit is a same-filesystem rename in the common case.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub root: PathBuf,
    pub logs_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>, shard_prefix: &str) -> Self {
        let root = root.into();
        let logs_dir = root.join(LOG_DIR);
        let staging_dir = root.join(format!(".{shard_prefix}-staging"));
        Self {
            root,
            logs_dir,
            staging_dir,
        }
    }

    pub fn pending_log(&self) -> PathBuf {
        self.logs_dir.join("pending.txt")
    }

    pub fn completed_log(&self) -> PathBuf {
        self.logs_dir.join("completed.txt")
    }

    pub fn failed_log(&self) -> PathBuf {
        self.logs_dir.join("failed.txt")
    }

    pub fn mapping_file(&self) -> PathBuf {
        self.logs_dir.join("shard_mapping.json")
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.logs_dir.join("download_progress.json")
    }

    pub fn error_list_file(&self) -> PathBuf {
        self.logs_dir.join("download_errors.txt")
    }

    /// Directory that holds the shard folders.
    pub fn shard_root(&self) -> &Path {
        &self.root
    }

    pub fn create_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.logs_dir)?;
        std::fs::create_dir_all(&self.staging_dir)?;
        Ok(())
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let layout = RunLayout::new("/data/run", "molmo2-videos");
        assert_eq!(layout.logs_dir, Path::new("/data/run/download_logs"));
        assert_eq!(layout.staging_dir, Path::new("/data/run/.molmo2-videos-staging"));
        assert_eq!(
            layout.failed_log(),
            Path::new("/data/run/download_logs/failed.txt")
        );
        assert_eq!(layout.shard_root(), Path::new("/data/run"));
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        write_atomic(&path, b"{\"a\":1}").unwrap();
        write_atomic(&path, b"{\"a\":2}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":2}");
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }
}
