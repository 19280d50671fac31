//! Process-backed fetcher driving `yt-dlp` (or a compatible downloader).

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::classify::{is_unavailable, summarize_stderr};
use super::process::{run_with_timeout, ProcessResult};
use super::staging::{find_artifact, normalize_extension, remove_item_files};
use super::{FetchOutcome, FetchRequest, Fetcher};
use crate::probe::{probe_duration, ProbeSettings};
use crate::work::is_safe_id;

/// Format selector preferring mp4/m4a at or below `max_height`, falling back to
/// any container at that height and finally to the best available stream.
pub fn format_selector(max_height: u32) -> String {
    let h = max_height;
    format!(
        "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/bestvideo[height<={h}]+bestaudio/best[height<={h}]/best"
    )
}

#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    program: PathBuf,
    extra_args: Vec<String>,
    ffmpeg_dir: Option<PathBuf>,
    max_height: u32,
    min_artifact_bytes: u64,
    probe: Option<ProbeSettings>,
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>, max_height: u32, min_artifact_bytes: u64) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            ffmpeg_dir: None,
            max_height,
            min_artifact_bytes,
            probe: None,
        }
    }

    /// Arguments placed before the generated ones (e.g. a script path when the
    /// program is an interpreter).
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_ffmpeg_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.ffmpeg_dir = dir;
        self
    }

    pub fn with_probe(mut self, probe: Option<ProbeSettings>) -> Self {
        self.probe = probe;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full downloader argument list for one request.
    pub fn build_args(&self, request: &FetchRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push("-f".into());
        args.push(format_selector(self.max_height).into());
        args.push("--merge-output-format".into());
        args.push("mp4".into());
        args.push("-o".into());
        args.push(
            request
                .staging_dir
                .join(format!("{}.%(ext)s", request.item.id))
                .into_os_string(),
        );
        for flag in [
            "--no-warnings",
            "-q",
            "--no-progress",
            "--retries",
            "2",
            "--fragment-retries",
            "2",
            "--buffer-size",
            "16K",
            "--no-overwrites",
            "--no-write-info-json",
            "--no-write-thumbnail",
            "--no-write-description",
        ] {
            args.push(flag.into());
        }
        if let Some(dir) = &self.ffmpeg_dir {
            args.push("--ffmpeg-location".into());
            args.push(dir.clone().into_os_string());
        }
        args.push(request.item.source.clone().into());
        args
    }

    async fn validate(&self, probe: &ProbeSettings, path: &Path) -> Result<(), String> {
        let secs = probe_duration(&probe.program, path, probe.timeout)
            .await
            .map_err(|e| format!("probe: {e}"))?;
        match probe.min_duration_secs {
            Some(min) if secs < min => Err(format!("duration {secs:.1}s below {min:.1}s")),
            _ => Ok(()),
        }
    }

    async fn run(&self, request: FetchRequest) -> FetchOutcome {
        let id = request.item.id.as_str();
        let staging = request.staging_dir.as_path();
        if !is_safe_id(id) {
            return FetchOutcome::Failed(format!("unsafe id {id:?}"));
        }
        if let Err(e) = std::fs::create_dir_all(staging) {
            return FetchOutcome::Failed(format!("create staging dir: {e}"));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(self.build_args(&request));
        let output = match run_with_timeout(cmd, request.timeout).await {
            Ok(ProcessResult::Exited(output)) => output,
            Ok(ProcessResult::TimedOut) => {
                remove_item_files(staging, id);
                tracing::debug!(id, timeout = ?request.timeout, "fetch timed out");
                return FetchOutcome::Timeout;
            }
            Err(e) => {
                remove_item_files(staging, id);
                return FetchOutcome::Failed(format!(
                    "start {}: {}",
                    self.program.display(),
                    e
                ));
            }
        };
        tracing::debug!(id, status = %output.status, "downloader exited");

        let Some((found, size_bytes)) = find_artifact(staging, id, self.min_artifact_bytes) else {
            remove_item_files(staging, id);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = summarize_stderr(&stderr);
            return if is_unavailable(&stderr) {
                FetchOutcome::Unavailable(message)
            } else {
                FetchOutcome::Failed(message)
            };
        };

        let path = match normalize_extension(&found, id) {
            Ok(p) => p,
            Err(e) => {
                remove_item_files(staging, id);
                return FetchOutcome::Failed(format!("normalize {}: {}", found.display(), e));
            }
        };
        if let Some(probe) = &self.probe {
            if let Err(msg) = self.validate(probe, &path).await {
                remove_item_files(staging, id);
                return FetchOutcome::Failed(msg);
            }
        }
        FetchOutcome::Success { path, size_bytes }
    }
}

impl Fetcher for YtDlpFetcher {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = FetchOutcome> + Send {
        self.run(request)
    }
}
