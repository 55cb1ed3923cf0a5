// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::test_support::{session_record, task_builder};
use drover_core::Event;
use tempfile::tempdir;

fn populated_state() -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply_event(&Event::SessionRegistered {
        session: session_record("s-1", "alpha"),
    });
    state.apply_event(&Event::TaskCreated {
        task: task_builder("t-1", "s-1").build(),
    });
    state
}

#[test]
fn save_and_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    let snapshot = Snapshot::new(17, populated_state(), 1_000);
    snapshot.save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 17);
    assert_eq!(loaded.created_at_ms, 1_000);
    assert!(loaded.state.session("s-1").is_some());
    assert!(loaded.state.task("t-1").is_some());
}

#[test]
fn save_is_zstd_compressed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    Snapshot::new(1, populated_state(), 0).save(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    // zstd magic number
    assert_eq!(&bytes[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
}

#[test]
fn missing_snapshot_loads_as_none() {
    let dir = tempdir().unwrap();
    assert!(Snapshot::load(&dir.path().join("absent.zst"))
        .unwrap()
        .is_none());
}

#[test]
fn corrupt_snapshot_rotates_to_bak() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");
    std::fs::write(&path, b"definitely not zstd").unwrap();

    assert!(Snapshot::load(&path).unwrap().is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn save_overwrites_previous_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.zst");

    Snapshot::new(1, MaterializedState::default(), 0)
        .save(&path)
        .unwrap();
    Snapshot::new(2, populated_state(), 5).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 2);
}
