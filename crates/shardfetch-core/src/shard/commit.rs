//! Moving a staged artifact into its shard.

use std::io;
use std::path::{Path, PathBuf};

/// Error while committing a staged artifact to a shard.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("staged artifact missing: {}", .0.display())]
    StagedMissing(PathBuf),
    #[error("create shard dir {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("move {} -> {}: {source}", .from.display(), .to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

// ERROR_NOT_SAME_DEVICE
#[cfg(windows)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

/// Rename `from` to `to`; across filesystems, copy then delete the source.
/// A failed copy removes the partial destination.
pub(super) fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "cross-device move, copying");
            if let Err(copy_err) = std::fs::copy(from, to) {
                let _ = std::fs::remove_file(to);
                return Err(copy_err);
            }
            std::fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
