//! Tests for the shard allocator: capacity, recovery, persistence, reconciliation.

use std::collections::BTreeMap;
use std::path::Path;

use super::{recover_position, ShardAllocator, ShardMapping, ShardPosition};
use crate::layout::RunLayout;

fn stage(dir: &Path, id: &str, size: usize) -> std::path::PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(format!("{id}.mp4"));
    std::fs::write(&path, vec![7u8; size]).unwrap();
    path
}

fn mapping_with(counts: &[(&str, usize)]) -> ShardMapping {
    let mut mapping = ShardMapping::new();
    let mut n = 0;
    for (shard, count) in counts {
        for _ in 0..*count {
            mapping.insert(format!("vid{n}.mp4"), shard.to_string());
            n += 1;
        }
    }
    mapping
}

#[test]
fn recover_empty_starts_at_first_shard() {
    let mapping = ShardMapping::new();
    assert_eq!(
        recover_position(mapping.values(), 200),
        ShardPosition { index: 1, count: 0 }
    );
}

#[test]
fn recover_resumes_partial_last_shard() {
    let mapping = mapping_with(&[("videos-001", 4), ("videos-002", 1)]);
    assert_eq!(
        recover_position(mapping.values(), 4),
        ShardPosition { index: 2, count: 1 }
    );
}

#[test]
fn recover_advances_past_full_last_shard() {
    let mapping = mapping_with(&[("videos-001", 4), ("videos-002", 4)]);
    assert_eq!(
        recover_position(mapping.values(), 4),
        ShardPosition { index: 3, count: 0 }
    );
}

#[test]
fn recover_ignores_names_without_ordinal() {
    let mapping = mapping_with(&[("legacy", 10), ("videos-003", 2)]);
    assert_eq!(
        recover_position(mapping.values(), 4),
        ShardPosition { index: 3, count: 2 }
    );
}

#[test]
fn capacity_invariant_and_shard_count() {
    for capacity in 1..=5usize {
        for n in 0..=12usize {
            let dir = tempfile::tempdir().unwrap();
            let layout = RunLayout::new(dir.path(), "videos");
            let alloc = ShardAllocator::open(&layout, "videos", capacity).unwrap();
            for i in 0..n {
                let staged = stage(&layout.staging_dir, &format!("v{i}"), 16);
                alloc.allocate_and_commit(&format!("v{i}"), &staged).unwrap();
            }
            let counts = alloc.shard_counts();
            assert!(counts.values().all(|c| *c <= capacity));
            assert_eq!(counts.len(), n.div_ceil(capacity));
            assert_eq!(alloc.len(), n);
        }
    }
}

#[test]
fn recovery_consistency_after_reopen() {
    // M = 2 entries at ordinal K = 3, capacity C = 4.
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "videos");
    std::fs::create_dir_all(&layout.logs_dir).unwrap();
    let mapping = mapping_with(&[("videos-001", 4), ("videos-002", 4), ("videos-003", 2)]);
    std::fs::write(
        layout.mapping_file(),
        serde_json::to_string_pretty(&mapping).unwrap(),
    )
    .unwrap();

    let alloc = ShardAllocator::open(&layout, "videos", 4).unwrap();
    let mut placed = Vec::new();
    for i in 0..3 {
        let staged = stage(&layout.staging_dir, &format!("new{i}"), 16);
        placed.push(alloc.allocate_and_commit(&format!("new{i}"), &staged).unwrap());
    }
    assert_eq!(placed, vec!["videos-003", "videos-003", "videos-004"]);
}

#[test]
fn commit_moves_file_and_persist_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "molmo2-videos");
    let alloc = ShardAllocator::open(&layout, "molmo2-videos", 200).unwrap();
    let staged = stage(&layout.staging_dir, "abc", 32);

    let shard = alloc.allocate_and_commit("abc", &staged).unwrap();
    assert_eq!(shard, "molmo2-videos-001");
    assert!(!staged.exists());
    assert!(dir.path().join("molmo2-videos-001/abc.mp4").is_file());

    alloc.persist().unwrap();
    let json = std::fs::read_to_string(layout.mapping_file()).unwrap();
    let parsed: BTreeMap<String, String> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.get("abc.mp4").map(String::as_str), Some("molmo2-videos-001"));

    let reopened = ShardAllocator::open(&layout, "molmo2-videos", 200).unwrap();
    assert_eq!(reopened.position(), ShardPosition { index: 1, count: 1 });
    assert_eq!(
        reopened.artifact_path("abc"),
        Some(dir.path().join("molmo2-videos-001").join("abc.mp4"))
    );
    assert_eq!(reopened.existing_artifact("abc", 10), Some(32));
    assert_eq!(reopened.existing_artifact("abc", 100), None);
    assert_eq!(reopened.existing_artifact("zzz", 1), None);
}

#[test]
fn commit_of_missing_staged_file_leaves_state_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "videos");
    let alloc = ShardAllocator::open(&layout, "videos", 2).unwrap();
    let err = alloc
        .allocate_and_commit("ghost", &layout.staging_dir.join("ghost.mp4"))
        .unwrap_err();
    assert!(matches!(err, super::CommitError::StagedMissing(_)));
    assert!(alloc.is_empty());
    assert_eq!(alloc.position(), ShardPosition { index: 1, count: 0 });
}

#[test]
fn lookup_finds_non_canonical_extension() {
    let mut mapping = ShardMapping::new();
    mapping.insert("old.webm".to_string(), "videos-001".to_string());
    let alloc = ShardAllocator::with_mapping(
        mapping,
        "videos",
        10,
        Path::new("/data"),
        "/data/download_logs/shard_mapping.json".into(),
    );
    assert_eq!(
        alloc.lookup("old"),
        Some(("old.webm".to_string(), "videos-001".to_string()))
    );
    assert_eq!(alloc.lookup("missing"), None);
}

#[test]
fn lookup_prefers_canonical_name_and_tracks_commits() {
    let dir = tempfile::tempdir().unwrap();
    let mut mapping = mapping_with(&[("videos-001", 3000)]);
    mapping.insert("clip.mkv".to_string(), "videos-001".to_string());
    mapping.insert("clip.mp4".to_string(), "videos-002".to_string());
    let alloc = ShardAllocator::with_mapping(
        mapping,
        "videos",
        5000,
        dir.path(),
        dir.path().join("shard_mapping.json"),
    );
    assert_eq!(
        alloc.lookup("clip"),
        Some(("clip.mp4".to_string(), "videos-002".to_string()))
    );
    assert_eq!(alloc.lookup("vid2999").map(|(n, _)| n), Some("vid2999.mp4".to_string()));
    for n in 0..1000 {
        assert_eq!(alloc.lookup(&format!("new{n}")), None);
    }

    let staged = stage(&dir.path().join("staging"), "new7", 32);
    alloc.allocate_and_commit("new7", &staged).unwrap();
    assert_eq!(
        alloc.artifact_path("new7"),
        Some(dir.path().join("videos-002").join("new7.mp4"))
    );
    assert_eq!(alloc.existing_artifact("new7", 32), Some(32));
}

#[test]
fn reconcile_adopts_orphans_and_reports_missing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "videos");
    std::fs::create_dir_all(&layout.logs_dir).unwrap();

    // Mapping knows a.mp4 (present) and gone.mp4 (deleted); b.mp4 was moved but never mapped.
    let mut mapping = ShardMapping::new();
    mapping.insert("a.mp4".into(), "videos-001".into());
    mapping.insert("gone.mp4".into(), "videos-001".into());
    std::fs::write(
        layout.mapping_file(),
        serde_json::to_string(&mapping).unwrap(),
    )
    .unwrap();
    stage(&dir.path().join("videos-001"), "a", 16);
    stage(&dir.path().join("videos-002"), "b", 16);
    std::fs::write(dir.path().join("videos-002/c.mp4.part"), b"x").unwrap();
    stage(&dir.path().join("unrelated"), "z", 16);

    let alloc = ShardAllocator::open(&layout, "videos", 2).unwrap();
    assert_eq!(alloc.position(), ShardPosition { index: 2, count: 0 });

    let report = alloc.reconcile().unwrap();
    assert_eq!(report.adopted, vec!["b.mp4".to_string()]);
    assert_eq!(report.missing, vec!["gone.mp4".to_string()]);
    assert_eq!(alloc.lookup("b").map(|(_, s)| s), Some("videos-002".to_string()));
    assert_eq!(alloc.position(), ShardPosition { index: 2, count: 1 });
    assert_eq!(alloc.lookup("z"), None);

    // A second pass has nothing new to adopt.
    let again = alloc.reconcile().unwrap();
    assert!(again.adopted.is_empty());
}

#[test]
fn reconcile_on_fresh_root_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path().join("not-yet-created"), "videos");
    let alloc = ShardAllocator::with_mapping(
        ShardMapping::new(),
        "videos",
        4,
        layout.shard_root(),
        layout.mapping_file(),
    );
    assert!(alloc.reconcile().unwrap().is_clean());
}

#[test]
fn organize_sorts_flat_folder_into_shards() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "videos");
    let src = dir.path().join("videos");
    for id in ["e", "a", "d", "b", "c"] {
        stage(&src, id, 8);
    }
    std::fs::write(src.join("f.mp4.part"), b"x").unwrap();
    std::fs::create_dir_all(src.join("nested")).unwrap();

    let alloc = ShardAllocator::open(&layout, "videos", 2).unwrap();
    let mut calls = Vec::new();
    let report = alloc
        .organize_dir(&src, 2, |moved, total| calls.push((moved, total)))
        .unwrap();
    assert_eq!(report.moved, 5);
    assert!(report.already_mapped.is_empty());
    assert_eq!(calls, vec![(2, 5), (4, 5)]);

    let counts = alloc.shard_counts();
    assert_eq!(counts.get("videos-001"), Some(&2));
    assert_eq!(counts.get("videos-002"), Some(&2));
    assert_eq!(counts.get("videos-003"), Some(&1));
    assert!(dir.path().join("videos-001/a.mp4").is_file());
    assert!(dir.path().join("videos-001/b.mp4").is_file());
    assert!(dir.path().join("videos-003/e.mp4").is_file());
    assert!(src.join("f.mp4.part").is_file());

    // The mapping is on disk and a reopened allocator resumes in the last shard.
    let reopened = ShardAllocator::open(&layout, "videos", 2).unwrap();
    assert_eq!(reopened.len(), 5);
    assert_eq!(reopened.position(), ShardPosition { index: 3, count: 1 });
}

#[test]
fn organize_continues_after_existing_shards_and_skips_mapped_names() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "videos");
    let alloc = ShardAllocator::open(&layout, "videos", 3).unwrap();
    let staged = stage(&dir.path().join("staging"), "a", 8);
    alloc.allocate_and_commit("a", &staged).unwrap();

    let src = dir.path().join("incoming");
    stage(&src, "a", 8);
    stage(&src, "b", 8);
    let report = alloc.organize_dir(&src, 0, |_, _| {}).unwrap();
    assert_eq!(report.moved, 1);
    assert_eq!(report.already_mapped, vec!["a.mp4".to_string()]);
    assert!(src.join("a.mp4").is_file());
    assert_eq!(alloc.lookup("b").map(|(_, s)| s), Some("videos-001".to_string()));
}

#[test]
fn organize_rejects_missing_or_shard_source() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "videos");
    let alloc = ShardAllocator::open(&layout, "videos", 3).unwrap();
    assert!(alloc.organize_dir(&dir.path().join("nope"), 0, |_, _| {}).is_err());
    std::fs::create_dir_all(dir.path().join("videos-001")).unwrap();
    assert!(alloc
        .organize_dir(&dir.path().join("videos-001"), 0, |_, _| {})
        .is_err());
}
