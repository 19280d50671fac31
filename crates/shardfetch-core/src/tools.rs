//! Setup checks: external binaries on PATH and required input files.
//!
//! Everything here runs before any work is dispatched; a failure aborts the run.

use std::path::{Path, PathBuf};

/// Fatal error raised while preparing a run.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("required tool not found: {0} (install it or set its path in config.toml)")]
    ToolNotFound(String),
    #[error("required input file missing: {}", .0.display())]
    InputMissing(PathBuf),
}

/// Resolve `program` to an executable path. A value containing a path separator
/// is checked as-is; a bare name is searched for in `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

/// Like [`find_program`], but a missing tool is a [`SetupError`].
pub fn require_program(program: &str) -> Result<PathBuf, SetupError> {
    find_program(program).ok_or_else(|| SetupError::ToolNotFound(program.to_string()))
}

/// Fail with [`SetupError::InputMissing`] unless `path` is an existing file.
pub fn require_file(path: &Path) -> Result<(), SetupError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SetupError::InputMissing(path.to_path_buf()))
    }
}

/// Directory to pass as `--ffmpeg-location`: the configured one, else the
/// directory of `ffmpeg` on PATH, else None (downloader uses its own lookup).
pub fn ffmpeg_dir(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = configured {
        return Some(dir.to_path_buf());
    }
    find_program("ffmpeg").and_then(|p| p.parent().map(Path::to_path_buf))
}
