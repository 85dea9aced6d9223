//! Journal replay
//!
//! Rebuilds the in-memory store from the journal at startup. Records are
//! applied directly to the shards, bypassing the batcher and without
//! re-journaling. Empty lines are skipped; malformed lines (including a
//! partial tail record from a crash) are skipped silently and counted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::protocol::{parse_text, Command};
use crate::store::ShardedStore;

/// Outcome of a replay pass
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayReport {
    /// Records applied to the store
    pub applied: u64,

    /// Malformed or unexpected lines skipped
    pub skipped: u64,
}

/// Replay the journal at `path` into `store`.
///
/// A missing file is an empty journal. TTL records are stamped relative
/// to replay time: `EX <n>` becomes `now + n` seconds, so surviving TTLs
/// extend by the downtime. Already-expired entries are evicted lazily on
/// first access, as usual.
pub fn replay(path: &Path, store: &ShardedStore) -> ReplayReport {
    let mut report = ReplayReport::default();

    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return report,
    };

    let reader = BufReader::new(file);
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!("Journal read stopped early: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_text(&line) {
            Command::Set {
                key,
                value,
                ttl_seconds,
            } => {
                store.apply_set(key, value, ttl_seconds);
                report.applied += 1;
            }
            Command::Del { key } => {
                store.apply_del(&key);
                report.applied += 1;
            }
            // Only SET and DEL belong in the journal; anything else is a
            // torn or corrupt record.
            _ => {
                report.skipped += 1;
            }
        }
    }

    if report.skipped > 0 {
        tracing::warn!(
            "Journal replay skipped {} malformed line(s)",
            report.skipped
        );
    }

    report
}
