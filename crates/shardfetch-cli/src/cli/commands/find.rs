//! `shardfetch find <id>` – where an item's artifact lives.

use anyhow::Result;
use shardfetch_core::config::FetchConfig;
use shardfetch_core::layout::RunLayout;
use shardfetch_core::shard::ShardAllocator;
use std::path::Path;

pub fn run_find(root: &Path, cfg: &FetchConfig, id: &str) -> Result<()> {
    let layout = RunLayout::new(root, &cfg.shard_prefix);
    let allocator = ShardAllocator::open(&layout, &cfg.shard_prefix, cfg.per_shard_capacity)?;
    match allocator.artifact_path(id) {
        Some(path) => {
            let state = if path.is_file() { "present" } else { "missing" };
            println!("{}\t{}", path.display(), state);
        }
        None => println!("{id} is not in the shard mapping"),
    }
    Ok(())
}
