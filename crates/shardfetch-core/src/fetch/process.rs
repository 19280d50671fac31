//! Run an external process to completion or timeout.

use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// How long to keep reading pipes after the process has exited. A grandchild
/// that inherited stdout/stderr must not hold up the worker.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum ProcessResult {
    Exited(Output),
    /// The process exceeded its timeout and was killed and reaped.
    TimedOut,
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut r) = reader {
        let _ = r.read_to_end(&mut buf).await;
    }
    buf
}

async fn collect(mut handle: tokio::task::JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            handle.abort();
            Vec::new()
        }
    }
}

/// SIGKILL every process in the group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group is led by our unreaped child.
    if unsafe { libc::killpg(pid, libc::SIGKILL) } != 0 {
        tracing::debug!(pid, "killpg: {}", io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Spawn `cmd` with piped stdout/stderr and wait at most `timeout` for it.
///
/// On unix the child leads a new process group, so a terminal Ctrl-C aimed at
/// the caller does not reach it. On timeout the whole group is killed (helpers
/// such as ffmpeg included) and the child is reaped before returning.
pub async fn run_with_timeout(mut cmd: Command, timeout: Duration) -> io::Result<ProcessResult> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    // SAFETY: setpgid is async-signal-safe and touches no parent state.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        });
    }
    let mut child = cmd.spawn()?;
    let pid = child.id();

    let stdout_task = tokio::spawn(drain(child.stdout.take()));
    let stderr_task = tokio::spawn(drain(child.stderr.take()));

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = collect(stdout_task).await;
            let stderr = collect(stderr_task).await;
            Ok(ProcessResult::Exited(Output {
                status,
                stdout,
                stderr,
            }))
        }
        Err(_) => {
            kill_group(pid);
            if let Err(e) = child.kill().await {
                tracing::debug!("kill after timeout: {}", e);
            }
            stdout_task.abort();
            stderr_task.abort();
            Ok(ProcessResult::TimedOut)
        }
    }
}
