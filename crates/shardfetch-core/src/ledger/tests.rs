//! Tests for the work ledger (temp-dir backed).

use super::{LedgerStats, WorkLedger};
use crate::layout::RunLayout;

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn open(dir: &std::path::Path) -> WorkLedger {
    WorkLedger::open(&RunLayout::new(dir, "videos")).unwrap()
}

#[test]
fn first_run_everything_pending() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    let stats = ledger.initialize(&ids(&["a", "b", "c"])).unwrap();
    assert_eq!(
        stats,
        LedgerStats {
            pending: 3,
            completed: 0,
            failed: 0
        }
    );
    assert_eq!(ledger.pending().unwrap(), ids(&["a", "b", "c"]));
    assert_eq!(ledger.materialized_pending().unwrap(), ids(&["a", "b", "c"]));
}

#[test]
fn marks_are_excluded_from_pending_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    ledger.initialize(&ids(&["a", "b", "c", "d"])).unwrap();

    assert!(ledger.mark_completed("b").unwrap());
    assert!(ledger.mark_failed("d", "timeout").unwrap());
    assert_eq!(ledger.pending().unwrap(), ids(&["a", "c"]));

    let failed = ledger.failed_entries().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "d");
    assert_eq!(failed[0].reason, "timeout");
}

#[test]
fn reopen_recomputes_pending_from_logs() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = open(dir.path());
        ledger.initialize(&ids(&["a", "b", "c"])).unwrap();
        ledger.mark_completed("a").unwrap();
        ledger.mark_failed("c", "unavailable: private video").unwrap();
    }
    let ledger = open(dir.path());
    let stats = ledger.initialize(&ids(&["a", "b", "c", "e"])).unwrap();
    assert_eq!(
        stats,
        LedgerStats {
            pending: 2,
            completed: 1,
            failed: 1
        }
    );
    assert_eq!(ledger.pending().unwrap(), ids(&["b", "e"]));
}

#[test]
fn second_terminal_entry_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    ledger.initialize(&ids(&["a"])).unwrap();
    assert!(ledger.mark_completed("a").unwrap());
    assert!(!ledger.mark_completed("a").unwrap());
    assert!(!ledger.mark_failed("a", "late failure").unwrap());

    let completed = std::fs::read_to_string(dir.path().join("download_logs/completed.txt")).unwrap();
    assert_eq!(completed, "a\n");
    assert!(ledger.failed_entries().unwrap().is_empty());
}

#[test]
fn multiline_reason_stays_on_one_log_line() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    ledger.initialize(&ids(&["x", "y"])).unwrap();
    ledger
        .mark_failed("x", "failed: ERROR: first\nERROR:\tsecond")
        .unwrap();
    ledger.mark_failed("y", "timeout").unwrap();
    let failed = ledger.failed_entries().unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].reason, "failed: ERROR: first ERROR: second");
}

#[test]
fn duplicate_ids_in_universe_are_collapsed() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open(dir.path());
    let stats = ledger.initialize(&ids(&["a", "b", "a"])).unwrap();
    assert_eq!(stats.pending, 2);
}

#[test]
fn stats_without_initialize_use_materialized_pending() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = open(dir.path());
        ledger.initialize(&ids(&["a", "b", "c"])).unwrap();
        ledger.mark_completed("a").unwrap();
    }
    let ledger = open(dir.path());
    assert_eq!(
        ledger.stats().unwrap(),
        LedgerStats {
            pending: 2,
            completed: 1,
            failed: 0
        }
    );
}

#[test]
fn concurrent_marks_never_lose_entries() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = std::sync::Arc::new(open(dir.path()));
    let all: Vec<String> = (0..64).map(|i| format!("id{i}")).collect();
    ledger.initialize(&all).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let ledger = std::sync::Arc::clone(&ledger);
            std::thread::spawn(move || {
                for i in (t..64).step_by(4) {
                    if i % 2 == 0 {
                        ledger.mark_completed(&format!("id{i}")).unwrap();
                    } else {
                        ledger.mark_failed(&format!("id{i}"), "failed: x").unwrap();
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let stats = ledger.stats().unwrap();
    assert_eq!(stats.completed, 32);
    assert_eq!(stats.failed, 32);
    assert!(ledger.pending().unwrap().is_empty());
}

#[test]
fn earlier_failures_are_unfinished_but_not_pending() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = open(dir.path());
        ledger.initialize(&ids(&["a", "b", "c"])).unwrap();
        ledger.mark_completed("a").unwrap();
        ledger.mark_failed("b", "timeout").unwrap();
        // Failed in this run: not offered again.
        assert_eq!(ledger.unfinished().unwrap(), ids(&["c"]));
    }
    let ledger = open(dir.path());
    ledger.initialize(&ids(&["a", "b", "c"])).unwrap();
    assert_eq!(ledger.pending().unwrap(), ids(&["c"]));
    assert_eq!(ledger.unfinished().unwrap(), ids(&["b", "c"]));
}

#[test]
fn retried_success_clears_failure() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = open(dir.path());
        ledger.initialize(&ids(&["a", "b"])).unwrap();
        ledger.mark_failed("a", "timeout").unwrap();
        ledger.mark_failed("b", "failed: first").unwrap();
    }
    let ledger = open(dir.path());
    ledger.initialize(&ids(&["a", "b"])).unwrap();
    ledger.mark_completed("a").unwrap();
    ledger.mark_failed("b", "failed: second").unwrap();

    let stats = ledger.stats().unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    let failed = ledger.failed_entries().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "b");
    assert_eq!(failed[0].reason, "failed: second");
}
