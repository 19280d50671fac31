//! Media duration probing through an external tool (`ffprobe`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use crate::fetch::process::{run_with_timeout, ProcessResult};

/// Why a probe did not produce a duration.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("probe exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("unparsable duration output: {0:?}")]
    Parse(String),
}

/// Probe tool settings used by the fetch worker and the `probe` command.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub program: PathBuf,
    pub timeout: Duration,
    pub min_duration_secs: Option<f64>,
}

/// Parse ffprobe's `format=duration` output: one float on the first non-empty line.
pub fn parse_duration(stdout: &str) -> Result<f64, ProbeError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    match line.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(ProbeError::Parse(line.to_string())),
    }
}

/// Duration of the media file at `path`, in seconds.
pub async fn probe_duration(
    program: &Path,
    path: &Path,
    timeout: Duration,
) -> Result<f64, ProbeError> {
    let mut cmd = Command::new(program);
    cmd.args([
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(path);

    let output = match run_with_timeout(cmd, timeout).await {
        Ok(ProcessResult::Exited(output)) => output,
        Ok(ProcessResult::TimedOut) => return Err(ProbeError::Timeout(timeout)),
        Err(source) => {
            return Err(ProbeError::Spawn {
                program: program.display().to_string(),
                source,
            })
        }
    };
    if !output.status.success() {
        return Err(ProbeError::Exit {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_duration(&String::from_utf8_lossy(&output.stdout))
}
