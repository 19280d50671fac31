//! `shardfetch probe <file>...` – print media durations.

use anyhow::Result;
use shardfetch_core::config::FetchConfig;
use shardfetch_core::probe::probe_duration;
use shardfetch_core::tools::require_program;
use std::path::PathBuf;
use std::time::Duration;

pub async fn run_probe(cfg: &FetchConfig, files: &[PathBuf]) -> Result<()> {
    let probe_cfg = cfg.probe.clone().unwrap_or_default();
    let program = require_program(&probe_cfg.program)?;
    let timeout = Duration::from_secs(probe_cfg.timeout_secs);
    for file in files {
        match probe_duration(&program, file, timeout).await {
            Ok(secs) => println!("{}\t{:.3}", file.display(), secs),
            Err(e) => println!("{}\terror: {}", file.display(), e),
        }
    }
    Ok(())
}
