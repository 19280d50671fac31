//! `shardfetch status` – ledger counts, last snapshot, failures.

use anyhow::Result;
use shardfetch_core::config::FetchConfig;
use shardfetch_core::layout::RunLayout;
use shardfetch_core::ledger::WorkLedger;
use shardfetch_core::progress::{format_secs, ProgressSnapshot};
use std::path::Path;

/// Recent errors shown when `--failures` is not given.
const RECENT_SHOWN: usize = 5;

pub fn run_status(root: &Path, cfg: &FetchConfig, failures: bool) -> Result<()> {
    let layout = RunLayout::new(root, &cfg.shard_prefix);
    let ledger = WorkLedger::open(&layout)?;
    let stats = ledger.stats()?;
    println!("Pending:   {}", stats.pending);
    println!("Completed: {}", stats.completed);
    println!("Failed:    {}", stats.failed);

    if let Some(snap) = ProgressSnapshot::load(&layout.snapshot_file())? {
        let s = &snap.stats;
        println!(
            "Last run:  ok {}  failed {} (timeout {}, unavailable {})  skipped {}  {:.1} MiB in {}",
            s.success,
            s.failed,
            s.timeout,
            s.unavailable,
            s.skipped,
            s.total_bytes as f64 / 1_048_576.0,
            format_secs(s.elapsed_secs)
        );
        if !failures && !snap.errors.is_empty() {
            println!("Recent errors:");
            let skip = snap.errors.len().saturating_sub(RECENT_SHOWN);
            for (id, reason) in snap.errors.iter().skip(skip) {
                println!("  {id}\t{reason}");
            }
        }
    } else {
        println!("No run recorded yet.");
    }

    if failures {
        let entries = ledger.failed_entries()?;
        if entries.is_empty() {
            println!("No failures.");
        } else {
            println!("{:<16} REASON", "ID");
            for e in entries {
                println!("{:<16} {}", e.id, e.reason);
            }
        }
    }
    Ok(())
}
