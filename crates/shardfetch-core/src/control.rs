//! Run control: a shared stop flag for graceful cancellation.
//!
//! The coordinator checks the flag before every dispatch. A Ctrl-C handler or a
//! control client (`shardfetch stop` via socket) sets it; in-flight fetches
//! still finish and are recorded.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stop flag shared between the coordinator and whoever may cancel the run.
#[derive(Debug, Default)]
pub struct RunControl {
    stop: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop dispatching new work. Idempotent.
    pub fn request_stop(&self) {
        if !self.stop.swap(true, Ordering::SeqCst) {
            tracing::info!("stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Default path for the control socket (same XDG state dir as the log file).
pub fn default_control_socket_path() -> anyhow::Result<PathBuf> {
    crate::config::state_file("control.sock")
}
