use anyhow::{Context, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::fetch::staging::{remove_dir_if_empty, remove_item_files, sweep_partials};
use crate::fetch::{FetchOutcome, FetchRequest, Fetcher};
use crate::progress::{write_error_list, FailureKind};
use crate::work::WorkItem;

use super::{RunContext, RunOptions, RunSummary, StopReason};

/// Build the dispatch queue: input items deduplicated, the first `start`
/// dropped, then those the ledger still considers open, capped at `limit`.
/// The offset counts input positions, so it selects the same slice on every run.
fn build_queue(ctx: &RunContext, items: Vec<WorkItem>, opts: &RunOptions) -> Result<VecDeque<WorkItem>> {
    let open: HashSet<String> = if opts.retry_failed {
        ctx.ledger.unfinished()?
    } else {
        ctx.ledger.pending()?
    }
    .into_iter()
    .collect();
    let mut seen = HashSet::new();
    let mut queue: VecDeque<WorkItem> = items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .skip(opts.start)
        .filter(|item| open.contains(&item.id))
        .collect();
    if let Some(limit) = opts.limit {
        queue.truncate(limit);
    }
    Ok(queue)
}

fn every(n: u64, k: u64) -> bool {
    k > 0 && n > 0 && n % k == 0
}

/// Persist mapping and progress snapshot.
fn checkpoint(ctx: &RunContext) -> Result<()> {
    ctx.allocator.persist()?;
    ctx.reporter.snapshot().save(&ctx.layout.snapshot_file())?;
    Ok(())
}

/// Record a failure in ledger and reporter. Returns the reporter's recorded
/// count, or None if the ledger already had a terminal entry for the id.
fn record_failure(ctx: &RunContext, id: &str, kind: FailureKind, reason: &str) -> Result<Option<u64>> {
    if !ctx.ledger.mark_failed(id, reason)? {
        return Ok(None);
    }
    tracing::info!(id, reason, "item failed");
    Ok(Some(ctx.reporter.record_failure(id, kind, reason)))
}

/// Route one finished fetch: commit + complete on success, fail otherwise.
fn record_outcome(ctx: &RunContext, item: &WorkItem, outcome: FetchOutcome) -> Result<Option<u64>> {
    let id = item.id.as_str();
    let kind = match &outcome {
        FetchOutcome::Success { path, size_bytes } => {
            return match ctx.allocator.allocate_and_commit(id, path) {
                Ok(shard) => {
                    if !ctx.ledger.mark_completed(id)? {
                        return Ok(None);
                    }
                    tracing::debug!(id, shard = %shard, bytes = size_bytes, "item completed");
                    Ok(Some(ctx.reporter.record_success(*size_bytes)))
                }
                Err(e) => {
                    remove_item_files(&ctx.layout.staging_dir, id);
                    let reason = format!("commit: {e}");
                    record_failure(ctx, id, FailureKind::Other, &reason)
                }
            };
        }
        FetchOutcome::Timeout => FailureKind::Timeout,
        FetchOutcome::Unavailable(_) => FailureKind::Unavailable,
        FetchOutcome::Failed(_) => FailureKind::Other,
    };
    let reason = outcome
        .failure_reason()
        .unwrap_or_else(|| "failed: unknown".to_string());
    record_failure(ctx, id, kind, &reason)
}

/// Run every open item of `items` through `fetcher` with at most
/// `opts.workers` fetches in flight.
///
/// The ledger must already be initialized with the run's id universe. Items
/// whose artifact is already in a shard are recorded as completed without a
/// fetch. Dispatch stops when the queue is empty, the run control is stopped,
/// or the target is reached; in-flight fetches are always awaited and recorded.
/// A ledger or mapping I/O error stops dispatch and is returned once the
/// in-flight fetches are drained.
pub async fn run_pipeline<F: Fetcher>(
    ctx: Arc<RunContext>,
    fetcher: Arc<F>,
    items: Vec<WorkItem>,
    opts: &RunOptions,
    progress_tx: Option<tokio::sync::mpsc::Sender<String>>,
) -> Result<RunSummary> {
    let staging = ctx.layout.staging_dir.clone();
    std::fs::create_dir_all(&staging)
        .with_context(|| format!("create staging dir: {}", staging.display()))?;
    let swept = sweep_partials(&staging)?;
    if swept > 0 {
        tracing::info!(swept, "removed stale partial files from staging");
    }

    let reconcile = ctx.allocator.reconcile()?;
    if !reconcile.adopted.is_empty() {
        tracing::info!(adopted = reconcile.adopted.len(), "adopted unmapped artifacts");
        ctx.allocator.persist()?;
    }

    let mut queue = build_queue(&ctx, items, opts)?;
    let total = queue.len() as u64;
    let workers = opts.workers.max(1);
    tracing::info!(
        items = total,
        workers,
        shard = %ctx.allocator.current_shard(),
        "run started"
    );

    let mut join_set = tokio::task::JoinSet::new();
    let mut dispatched = 0usize;
    let mut stopped: Option<StopReason> = None;
    let mut fatal: Option<anyhow::Error> = None;

    loop {
        while join_set.len() < workers && stopped.is_none() && fatal.is_none() {
            if ctx.control.is_stopped() {
                stopped = Some(StopReason::Cancelled);
                break;
            }
            if opts.target.reached(&ctx.reporter.counters()) {
                tracing::info!(goal = ?opts.target, "target reached, no new dispatch");
                stopped = Some(StopReason::TargetReached);
                break;
            }
            let Some(item) = queue.pop_front() else {
                break;
            };

            if ctx
                .allocator
                .existing_artifact(&item.id, opts.min_artifact_bytes)
                .is_some()
            {
                match ctx.ledger.mark_completed(&item.id) {
                    Ok(true) => {
                        tracing::debug!(id = %item.id, "already in a shard, skipped");
                        let n = ctx.reporter.record_skipped();
                        report(&ctx, n, total, opts, progress_tx.as_ref(), &mut fatal);
                    }
                    Ok(false) => {}
                    Err(e) => fatal = Some(e),
                }
                continue;
            }

            let fetcher = Arc::clone(&fetcher);
            let request = FetchRequest {
                item: item.clone(),
                staging_dir: staging.clone(),
                timeout: opts.timeout,
            };
            dispatched += 1;
            join_set.spawn(async move {
                let outcome = fetcher.fetch(request).await;
                (item, outcome)
            });
        }

        if join_set.is_empty() {
            break;
        }
        let Some(joined) = join_set.join_next().await else {
            break;
        };
        match joined {
            Ok((item, outcome)) => match record_outcome(&ctx, &item, outcome) {
                Ok(Some(n)) => report(&ctx, n, total, opts, progress_tx.as_ref(), &mut fatal),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(id = %item.id, "recording outcome: {:#}", e);
                    fatal.get_or_insert(e);
                }
            },
            // The item has no terminal entry and stays pending for the next run.
            Err(e) => tracing::error!("fetch task join: {}", e),
        }
    }

    let persisted = checkpoint(&ctx);
    let counters = ctx.reporter.counters();
    let errors = ctx.reporter.recent_errors();
    if let Err(e) = write_error_list(&ctx.layout.error_list_file(), &errors) {
        tracing::warn!("{:#}", e);
    }
    if remove_dir_if_empty(&staging) {
        tracing::debug!(path = %staging.display(), "removed empty staging dir");
    }
    if let Some(e) = fatal {
        return Err(e);
    }
    persisted?;

    let summary = RunSummary {
        counters,
        dispatched,
        undispatched: queue.len(),
        shard_counts: ctx.allocator.shard_counts(),
        reconcile,
        stopped,
        elapsed_secs: ctx.reporter.elapsed_secs(),
    };
    tracing::info!(
        success = counters.success,
        failed = counters.failed,
        skipped = counters.skipped,
        undispatched = summary.undispatched,
        stopped = ?summary.stopped,
        "run finished"
    );
    Ok(summary)
}

/// Progress line and checkpoint after the `n`-th recorded item.
fn report(
    ctx: &RunContext,
    n: u64,
    total: u64,
    opts: &RunOptions,
    progress_tx: Option<&tokio::sync::mpsc::Sender<String>>,
    fatal: &mut Option<anyhow::Error>,
) {
    if every(n, opts.progress_every) {
        let line = ctx.reporter.progress_line(total, &ctx.shard_fill());
        tracing::info!("{}", line);
        if let Some(tx) = progress_tx {
            let _ = tx.try_send(line);
        }
    }
    if every(n, opts.snapshot_every) {
        if let Err(e) = checkpoint(ctx) {
            tracing::error!("checkpoint: {:#}", e);
            fatal.get_or_insert(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::every;

    #[test]
    fn every_nth() {
        assert!(!every(0, 10));
        assert!(every(10, 10));
        assert!(!every(11, 10));
        assert!(!every(5, 0));
    }
}
