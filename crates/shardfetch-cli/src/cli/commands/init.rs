//! `shardfetch init` – load the id universe into the ledger.

use anyhow::Result;
use shardfetch_core::config::FetchConfig;
use shardfetch_core::layout::RunLayout;
use shardfetch_core::ledger::WorkLedger;
use shardfetch_core::tools::require_file;
use shardfetch_core::work::load_ids;
use std::path::Path;

pub fn run_init(root: &Path, cfg: &FetchConfig, ids_path: &Path) -> Result<()> {
    require_file(ids_path)?;
    let ids = load_ids(ids_path)?;
    let layout = RunLayout::new(root, &cfg.shard_prefix);
    let ledger = WorkLedger::open(&layout)?;
    let stats = ledger.initialize(&ids)?;
    tracing::info!(total = ids.len(), ?stats, "ledger initialized");

    println!("Total:     {}", ids.len());
    println!("Pending:   {}", stats.pending);
    println!("Completed: {}", stats.completed);
    println!("Failed:    {}", stats.failed);
    println!("Pending list: {}", layout.pending_log().display());
    Ok(())
}
