use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Optional post-fetch validation through a probe tool (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe every fetched artifact before committing it to a shard.
    pub enabled: bool,
    /// Probe binary (name on PATH or absolute path).
    pub program: String,
    /// Upper bound for a single probe invocation, in seconds.
    pub timeout_secs: u64,
    /// Reject artifacts shorter than this many seconds (None = any duration).
    #[serde(default)]
    pub min_duration_secs: Option<f64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            program: "ffprobe".to_string(),
            timeout_secs: 30,
            min_duration_secs: None,
        }
    }
}

/// Global configuration loaded from `~/.config/shardfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Number of concurrent fetch workers.
    pub workers: usize,
    /// Per-item timeout for the downloader process, in seconds.
    pub timeout_secs: u64,
    /// Maximum number of artifacts per shard directory.
    pub per_shard_capacity: usize,
    /// Shard directory prefix; shards are named `<prefix>-001`, `<prefix>-002`, ...
    pub shard_prefix: String,
    /// Files smaller than this are never accepted as a finished artifact.
    pub min_artifact_bytes: u64,
    /// Highest video resolution requested from the downloader.
    pub max_height: u32,
    /// Downloader binary (name on PATH or absolute path).
    pub downloader: String,
    /// Arguments placed before the generated ones on every downloader invocation.
    #[serde(default)]
    pub downloader_args: Vec<String>,
    /// Directory holding ffmpeg, passed to the downloader. None = look up `ffmpeg` on PATH.
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,
    /// Field of each id -> source mapping entry that holds the URL.
    pub url_field: String,
    /// Print a progress line every N recorded items.
    pub progress_every: u64,
    /// Persist the shard mapping and progress snapshot every N recorded items.
    pub snapshot_every: u64,
    /// Number of recent errors kept in the progress snapshot.
    pub recent_errors: usize,
    /// Retry ids that failed in an earlier run.
    #[serde(default = "default_retry_failed")]
    pub retry_failed: bool,
    /// Optional probe validation; if missing, artifacts are not probed.
    #[serde(default)]
    pub probe: Option<ProbeConfig>,
}

fn default_retry_failed() -> bool {
    true
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_secs: 120,
            per_shard_capacity: 200,
            shard_prefix: "videos".to_string(),
            min_artifact_bytes: 10_000,
            max_height: 480,
            downloader: "yt-dlp".to_string(),
            downloader_args: Vec::new(),
            ffmpeg_location: None,
            url_field: "youtube_url".to_string(),
            progress_every: 10,
            snapshot_every: 100,
            recent_errors: 100,
            retry_failed: true,
            probe: None,
        }
    }
}

impl FetchConfig {
    /// Probe settings when probing is switched on.
    pub fn active_probe(&self) -> Option<&ProbeConfig> {
        self.probe.as_ref().filter(|p| p.enabled)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("shardfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Path of a file under the XDG state dir (`~/.local/state/shardfetch/<name>`);
/// parent directories are created.
pub fn state_file(name: &str) -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("shardfetch")?;
    Ok(xdg_dirs.place_state_file(name)?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FetchConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
