// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-storage: durable session/task store.
//!
//! The store is event-sourced: every mutation is an [`drover_core::Event`]
//! appended to a JSONL write-ahead log and applied to the in-memory
//! [`MaterializedState`]. Recovery loads the newest snapshot and replays
//! WAL entries after it. The store mutex is the transaction boundary —
//! read-modify-write sequences (queue positions, the single-active-task
//! check) run entirely inside [`TaskStore::try_commit`].

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{Snapshot, SnapshotError};
pub use state::MaterializedState;
pub use store::{StoreError, TaskStore};
pub use wal::{Wal, WalEntry, WalError};
