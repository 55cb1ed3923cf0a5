// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! A snapshot is the complete materialized state at a WAL sequence number,
//! serialized as JSON and zstd-compressed. Recovery loads the snapshot and
//! replays WAL entries after its sequence. Saves are atomic (tmp + rename);
//! a corrupt snapshot rotates to `.bak` so recovery can continue from the
//! WAL alone.

use crate::MaterializedState;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// zstd compression level for snapshot files
const COMPRESSION_LEVEL: i32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The materialized state at a point in the WAL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// WAL sequence number covered by this snapshot
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at_ms: u64,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at_ms: u64) -> Self {
        Self {
            seq,
            state,
            created_at_ms,
        }
    }

    /// Save atomically: write compressed JSON to `.tmp`, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load a snapshot if present.
    ///
    /// Returns `Ok(None)` when the file doesn't exist or is corrupt; a
    /// corrupt file is moved to `.bak` so WAL replay can proceed.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let mut compressed = Vec::new();
        File::open(path)?.read_to_end(&mut compressed)?;

        let parsed = zstd::decode_all(compressed.as_slice())
            .map_err(SnapshotError::from)
            .and_then(|json| serde_json::from_slice::<Snapshot>(&json).map_err(SnapshotError::from));

        match parsed {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let bak = path.with_extension("bak");
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak.display(),
                    "corrupt snapshot; rotating to .bak and recovering from WAL",
                );
                fs::rename(path, &bak)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
