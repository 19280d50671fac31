//! `shardfetch run` – download pending items into shard folders.

use anyhow::{bail, Result};
use shardfetch_core::config::FetchConfig;
use shardfetch_core::control::RunControl;
use shardfetch_core::coordinator::{
    run_pipeline, RunContext, RunOptions, RunSummary, StopReason, StopTarget,
};
use shardfetch_core::fetch::YtDlpFetcher;
use shardfetch_core::layout::RunLayout;
use shardfetch_core::probe::ProbeSettings;
use shardfetch_core::progress::format_secs;
use shardfetch_core::tools::{ffmpeg_dir, require_file, require_program};
use shardfetch_core::work::{load_ids, SourceMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::control_socket;
use crate::cli::RunArgs;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Config with the command-line overrides applied.
fn effective_config(cfg: &FetchConfig, args: &RunArgs) -> FetchConfig {
    let mut cfg = cfg.clone();
    if let Some(w) = args.workers {
        cfg.workers = w;
    }
    if let Some(t) = args.timeout {
        cfg.timeout_secs = t;
    }
    if let Some(c) = args.per_shard_capacity {
        cfg.per_shard_capacity = c;
    }
    if args.no_retry_failed {
        cfg.retry_failed = false;
    }
    cfg
}

fn run_options(cfg: &FetchConfig, args: &RunArgs) -> RunOptions {
    let mut opts = RunOptions::from_config(cfg);
    opts.target = StopTarget {
        successes: args.target,
        bytes: args.target_gb.map(|gb| (gb.max(0.0) * GIB) as u64),
    };
    opts.start = args.start;
    opts.limit = args.limit;
    opts
}

fn print_summary(summary: &RunSummary) {
    let c = &summary.counters;
    println!();
    println!("Done in {}", format_secs(summary.elapsed_secs));
    println!("  Success:     {}", c.success);
    println!("  Skipped:     {}", c.skipped);
    println!("  Failed:      {}", c.failed);
    println!("    timeout:     {}", c.timeout);
    println!("    unavailable: {}", c.unavailable);
    println!("  Downloaded:  {:.2} GiB", c.total_bytes as f64 / GIB);
    if !summary.reconcile.adopted.is_empty() {
        println!("  Adopted:     {} unmapped file(s)", summary.reconcile.adopted.len());
    }
    if !summary.reconcile.missing.is_empty() {
        println!("  Missing:     {} mapped file(s) not on disk", summary.reconcile.missing.len());
    }
    match summary.stopped {
        Some(StopReason::Cancelled) => {
            println!("Stopped on request; {} item(s) left pending.", summary.undispatched)
        }
        Some(StopReason::TargetReached) => {
            println!("Target reached; {} item(s) left pending.", summary.undispatched)
        }
        None => {}
    }
    if !summary.shard_counts.is_empty() {
        println!("Shards:");
        for (shard, count) in &summary.shard_counts {
            println!("  {shard}: {count}");
        }
    }
}

pub async fn run_fetch(root: &Path, cfg: &FetchConfig, args: RunArgs) -> Result<()> {
    let cfg = effective_config(cfg, &args);
    let opts = run_options(&cfg, &args);

    require_file(&args.urls)?;
    if let Some(ids) = &args.ids {
        require_file(ids)?;
    }
    let downloader = require_program(&cfg.downloader)?;
    let probe = match cfg.active_probe() {
        Some(p) => Some(ProbeSettings {
            program: require_program(&p.program)?,
            timeout: Duration::from_secs(p.timeout_secs),
            min_duration_secs: p.min_duration_secs,
        }),
        None => None,
    };

    let control = Arc::new(RunControl::new());
    let ctx = Arc::new(RunContext::open(
        RunLayout::new(root, &cfg.shard_prefix),
        &cfg.shard_prefix,
        cfg.per_shard_capacity,
        cfg.recent_errors,
        Arc::clone(&control),
    )?);

    let ids = match &args.ids {
        Some(path) => load_ids(path)?,
        None => ctx.ledger.materialized_pending()?,
    };
    if ids.is_empty() {
        bail!("no ids to process: pass --ids <file> or run `shardfetch init` first");
    }
    let stats = ctx.ledger.initialize(&ids)?;
    println!(
        "Total {}  pending {}  completed {}  failed {}",
        ids.len(),
        stats.pending,
        stats.completed,
        stats.failed
    );

    let sources = SourceMap::load(&args.urls, &cfg.url_field)?;
    let (items, missing) = sources.resolve(&ids);
    if missing > 0 {
        tracing::warn!(missing, "ids without a source URL are not dispatched");
        println!("{missing} id(s) have no source URL and are skipped");
    }

    let fetcher = YtDlpFetcher::new(downloader, cfg.max_height, cfg.min_artifact_bytes)
        .with_extra_args(cfg.downloader_args.clone())
        .with_ffmpeg_dir(ffmpeg_dir(cfg.ffmpeg_location.as_deref()))
        .with_probe(probe);
    tracing::debug!(program = %fetcher.program().display(), "downloader resolved");

    let socket_path = shardfetch_core::control::default_control_socket_path().ok();
    let listener = match &socket_path {
        Some(path) => match control_socket::spawn_control_listener(Arc::clone(&control), path) {
            Ok(handle) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        },
        None => None,
    };

    let ctrl_c = {
        let control = Arc::clone(&control);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nStopping: waiting for in-flight downloads...");
                control.request_stop();
            }
        })
    };

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<String>(64);
    let printer = tokio::spawn(async move {
        while let Some(line) = progress_rx.recv().await {
            println!("{line}");
        }
    });

    let result = run_pipeline(Arc::clone(&ctx), Arc::new(fetcher), items, &opts, Some(progress_tx)).await;

    let _ = printer.await;
    ctrl_c.abort();
    if let Some(handle) = listener {
        handle.abort();
    }
    if let Some(path) = &socket_path {
        let _ = std::fs::remove_file(path);
    }

    let summary = result?;
    print_summary(&summary);
    Ok(())
}
