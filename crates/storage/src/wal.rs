// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event write-ahead log.
//!
//! Each entry is one line of JSON: `{"seq":N,"event":{...}}\n`. Events are
//! appended and fsynced before they are applied to the materialized state,
//! so a crash can always be recovered by snapshot + replay. A corrupt tail
//! (torn write) rotates the file to `.bak` and preserves the valid prefix.

use drover_core::Event;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialization helper for writing entries without cloning the event.
#[derive(Serialize)]
struct WalRecordRef<'a> {
    seq: u64,
    event: &'a Event,
}

/// Deserialization helper for reading entries.
#[derive(Deserialize)]
struct WalRecord {
    seq: u64,
    event: Event,
}

/// A single WAL entry with its sequence number
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only JSONL log of events with monotonic sequence numbers.
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Next sequence number to assign
    next_seq: u64,
}

impl Wal {
    /// Open or create a WAL at `path`, returning the replayable entries.
    ///
    /// `base_seq` is the snapshot's sequence number (0 without a snapshot);
    /// assigned sequence numbers stay above it even when the log file was
    /// truncated by a checkpoint.
    pub fn open(path: &Path, base_seq: u64) -> Result<(Self, Vec<WalEntry>), WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (entries, corrupt_at) = match File::open(path) {
            Ok(file) => scan(file)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Vec::new(), None),
            Err(e) => return Err(e.into()),
        };

        if let Some(line_no) = corrupt_at {
            // Rotate the damaged file aside and rewrite the valid prefix.
            let bak = path.with_extension("jsonl.bak");
            warn!(
                path = %path.display(),
                bak = %bak.display(),
                valid_entries = entries.len(),
                line = line_no,
                "corrupt WAL tail; rotating and preserving valid prefix",
            );
            std::fs::rename(path, &bak)?;

            let mut fresh = File::create(path)?;
            for entry in &entries {
                let line = serde_json::to_vec(&WalRecordRef {
                    seq: entry.seq,
                    event: &entry.event,
                })?;
                fresh.write_all(&line)?;
                fresh.write_all(b"\n")?;
            }
            fresh.sync_all()?;
        }

        let last_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok((
            Self {
                file,
                path: path.to_owned(),
                next_seq: last_seq.max(base_seq) + 1,
            },
            entries,
        ))
    }

    /// Append an event, returning its sequence number. Call [`Wal::sync`]
    /// before treating the batch as durable.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.next_seq;
        let line = serde_json::to_vec(&WalRecordRef { seq, event })?;
        self.file.write_all(&line)?;
        self.file.write_all(b"\n")?;
        self.next_seq += 1;
        Ok(seq)
    }

    /// Flush appended entries to disk.
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Discard all entries after a checkpoint. Sequence numbers keep
    /// counting from where they were.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file = File::create(&self.path)?;
        Ok(())
    }

    /// Highest sequence number assigned so far (0 when empty).
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }
}

/// Read every parseable entry; report the first corrupt line if any.
fn scan(file: File) -> Result<(Vec<WalEntry>, Option<usize>), WalError> {
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalRecord>(&line) {
            Ok(record) => entries.push(WalEntry {
                seq: record.seq,
                event: record.event,
            }),
            Err(_) => return Ok((entries, Some(idx + 1))),
        }
    }

    Ok((entries, None))
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
