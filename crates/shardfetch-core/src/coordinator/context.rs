use anyhow::{Context, Result};
use std::sync::Arc;

use crate::control::RunControl;
use crate::layout::RunLayout;
use crate::ledger::WorkLedger;
use crate::progress::{ProgressReporter, ShardFill};
use crate::shard::ShardAllocator;

/// Everything one run shares between the coordinator and its callers.
/// Built once per run and passed around in an `Arc`.
pub struct RunContext {
    pub layout: RunLayout,
    pub ledger: WorkLedger,
    pub allocator: ShardAllocator,
    pub reporter: ProgressReporter,
    pub control: Arc<RunControl>,
}

impl RunContext {
    /// Open ledger and allocator under `layout.root`, creating the logs and
    /// staging dirs.
    pub fn open(
        layout: RunLayout,
        shard_prefix: &str,
        per_shard_capacity: usize,
        recent_errors: usize,
        control: Arc<RunControl>,
    ) -> Result<Self> {
        layout
            .create_dirs()
            .with_context(|| format!("create run dirs under {}", layout.root.display()))?;
        let ledger = WorkLedger::open(&layout)?;
        let allocator = ShardAllocator::open(&layout, shard_prefix, per_shard_capacity)?;
        Ok(Self {
            layout,
            ledger,
            allocator,
            reporter: ProgressReporter::new(recent_errors),
            control,
        })
    }

    /// Current shard fill. Takes the allocator lock only.
    pub fn shard_fill(&self) -> ShardFill {
        let position = self.allocator.position();
        ShardFill {
            shard: self.allocator.current_shard(),
            count: position.count,
            capacity: self.allocator.capacity(),
        }
    }
}
