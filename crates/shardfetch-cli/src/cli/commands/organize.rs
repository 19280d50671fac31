//! `shardfetch organize --src <dir>` – sort an existing flat folder into shards.

use anyhow::Result;
use shardfetch_core::config::FetchConfig;
use shardfetch_core::layout::RunLayout;
use shardfetch_core::shard::ShardAllocator;
use std::path::Path;

const REPORT_EVERY: usize = 1000;

pub fn run_organize(
    root: &Path,
    cfg: &FetchConfig,
    src: &Path,
    per_shard_capacity: Option<usize>,
) -> Result<()> {
    let capacity = per_shard_capacity.unwrap_or(cfg.per_shard_capacity);
    let layout = RunLayout::new(root, &cfg.shard_prefix);
    let allocator = ShardAllocator::open(&layout, &cfg.shard_prefix, capacity)?;
    let reconcile = allocator.reconcile()?;
    if !reconcile.adopted.is_empty() {
        println!("Adopted {} unmapped file(s) already in shards", reconcile.adopted.len());
    }
    println!("Starting at {}", allocator.current_shard());

    let report = allocator.organize_dir(src, REPORT_EVERY, |moved, total| {
        println!("  {moved}/{total} moved...");
    })?;

    println!("Moved:   {}", report.moved);
    if !report.already_mapped.is_empty() {
        println!("Left in place (already mapped): {}", report.already_mapped.len());
    }
    println!("Shards:");
    for (shard, count) in allocator.shard_counts() {
        println!("  {shard}: {count}");
    }
    println!("Mapping: {}", layout.mapping_file().display());
    Ok(())
}
