// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable task store: WAL + snapshot + materialized state behind one
//! mutex. The mutex is the transaction boundary; `try_commit` lets callers
//! validate against the current state and stage events atomically.

use crate::{MaterializedState, Snapshot, SnapshotError, Wal, WalError};
use drover_core::Event;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;

const WAL_FILE: &str = "wal.jsonl";
const SNAPSHOT_FILE: &str = "snapshot.zst";

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

struct StoreInner {
    state: MaterializedState,
    wal: Wal,
}

/// Durable, transactional session/task store.
pub struct TaskStore {
    inner: Mutex<StoreInner>,
    snapshot_path: PathBuf,
}

impl TaskStore {
    /// Open the store in `dir`: load the snapshot (if any), replay WAL
    /// entries past it, and be ready for commits.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let wal_path = dir.join(WAL_FILE);

        let (mut state, base_seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (MaterializedState::default(), 0),
        };

        let (wal, entries) = Wal::open(&wal_path, base_seq)?;
        let mut replayed = 0usize;
        for entry in &entries {
            if entry.seq > base_seq {
                state.apply_event(&entry.event);
                replayed += 1;
            }
        }

        tracing::info!(
            dir = %dir.display(),
            base_seq,
            replayed,
            sessions = state.sessions.len(),
            tasks = state.tasks.len(),
            "store opened"
        );

        Ok(Self {
            inner: Mutex::new(StoreInner { state, wal }),
            snapshot_path,
        })
    }

    /// Run a read-only query against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let inner = self.inner.lock();
        f(&inner.state)
    }

    /// Commit events unconditionally (single transaction).
    pub fn commit(&self, events: Vec<Event>) -> Result<(), StoreError> {
        self.try_commit(|_| Ok::<_, StoreError>((events, ())))
    }

    /// Validate against the current state and commit atomically.
    ///
    /// The closure sees the state under the store lock; whatever events it
    /// returns are appended to the WAL, fsynced, and applied before the
    /// lock is released. Returning `Err` commits nothing.
    pub fn try_commit<T, E: From<StoreError>>(
        &self,
        f: impl FnOnce(&MaterializedState) -> Result<(Vec<Event>, T), E>,
    ) -> Result<T, E> {
        let mut inner = self.inner.lock();
        let (events, value) = f(&inner.state)?;

        for event in &events {
            tracing::debug!(event = %event.log_summary(), "commit");
            inner
                .wal
                .append(event)
                .map_err(StoreError::from)
                .map_err(E::from)?;
        }
        if !events.is_empty() {
            inner.wal.sync().map_err(StoreError::from).map_err(E::from)?;
        }
        for event in &events {
            inner.state.apply_event(event);
        }

        Ok(value)
    }

    /// Write a snapshot of the current state and truncate the WAL.
    pub fn checkpoint(&self, now_ms: u64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let snapshot = Snapshot::new(inner.wal.last_seq(), inner.state.clone(), now_ms);
        // Snapshot must be durable before the WAL shrinks
        snapshot.save(&self.snapshot_path)?;
        inner.wal.truncate()?;
        tracing::info!(seq = snapshot.seq, "checkpoint written");
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
