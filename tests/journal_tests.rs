//! Tests for the journal
//!
//! These tests verify:
//! - Replay of well-formed, empty, and malformed lines
//! - TTL stamping relative to replay time
//! - Compaction: live-entries-only rewrite, atomic swap, append-after
//! - The replay-equals-memory invariant

use std::fs;
use std::io::Write as _;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pulsekv::journal::{replay, Journal};
use pulsekv::metrics::Metrics;
use pulsekv::store::ShardedStore;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn fresh_store(journal: &Arc<Journal>) -> ShardedStore {
    ShardedStore::new(16, Arc::clone(journal), Arc::new(Metrics::new()))
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_replay_missing_file_is_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.log");
    let journal = Arc::new(Journal::open(temp.path().join("wal.log")));
    let store = fresh_store(&journal);

    let report = replay(&path, &store);
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 0);
    assert!(store.is_empty());
}

#[test]
fn test_replay_applies_sets_and_dels() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");
    fs::write(
        &path,
        "SET a 1\nSET b two words\nSET a 111\nDEL b\n",
    )
    .unwrap();

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);
    let report = replay(&path, &store);

    assert_eq!(report.applied, 4);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.get("a"), Some("111".to_string()));
    assert_eq!(store.get("b"), None);
}

#[test]
fn test_replay_skips_empty_and_malformed_lines() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");
    // The GET line and the torn tail must be skipped, not fail replay
    fs::write(
        &path,
        "SET a 1\n\n   \nGET a\nnot a command\nSET b 2\nSET c",
    )
    .unwrap();

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);
    let report = replay(&path, &store);

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 3);
    assert_eq!(store.get("a"), Some("1".to_string()));
    assert_eq!(store.get("b"), Some("2".to_string()));
}

#[test]
fn test_replay_stamps_ttl_from_replay_time() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");
    fs::write(&path, "SET k v EX 1\n").unwrap();

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);
    replay(&path, &store);

    // Live immediately after replay, gone after the TTL elapses
    assert_eq!(store.get("k"), Some("v".to_string()));
    thread::sleep(Duration::from_millis(1_500));
    assert_eq!(store.get("k"), None);
}

#[test]
fn test_replay_equals_memory() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);
    for i in 0..50 {
        store.set(format!("key_{}", i), format!("value_{}", i), 0);
    }
    for i in (0..50).step_by(3) {
        store.del(&format!("key_{}", i));
    }
    journal.flush();

    // Rebuild a second store from the journal alone
    let replayed = fresh_store(&Arc::new(Journal::open(temp.path().join("other.log"))));
    replay(&path, &replayed);

    assert_eq!(replayed.entry_count(), store.entry_count());
    for i in 0..50 {
        let key = format!("key_{}", i);
        assert_eq!(replayed.get(&key), store.get(&key), "mismatch at {}", key);
    }
}

// =============================================================================
// Compaction
// =============================================================================

#[test]
fn test_compaction_keeps_only_live_entries() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);

    store.set("keep".into(), "v".into(), 0);
    store.set("gone".into(), "v".into(), 0);
    store.set("gone".into(), "v2".into(), 0);
    store.del("gone");
    journal.flush();

    // Pre-compaction journal carries the full history
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 4);

    store.compact();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "SET keep v\n");
    assert!(!path.with_extension("log.tmp").exists());
}

#[test]
fn test_compaction_preserves_remaining_ttl() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);

    store.set("session".into(), "tok".into(), 120);
    store.compact();

    let contents = fs::read_to_string(&path).unwrap();
    let line = contents.lines().next().unwrap();
    let remaining: u64 = line
        .rsplit(' ')
        .next()
        .and_then(|s| s.parse().ok())
        .expect("EX clause present");
    assert!(line.starts_with("SET session tok EX "));
    assert!(remaining >= 118 && remaining <= 120, "remaining={}", remaining);
}

#[test]
fn test_compaction_drops_expired_entries() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);

    store.set("short".into(), "v".into(), 1);
    store.set("perm".into(), "v".into(), 0);
    thread::sleep(Duration::from_millis(1_500));

    store.compact();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "SET perm v\n");
}

#[test]
fn test_journal_appendable_after_compaction() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);

    store.set("a".into(), "1".into(), 0);
    store.compact();
    store.set("b".into(), "2".into(), 0);
    journal.flush();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("SET a 1"));
    assert!(contents.contains("SET b 2"));
}

#[test]
fn test_compaction_survives_restart() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    {
        let journal = Arc::new(Journal::open(&path));
        let store = fresh_store(&journal);
        for i in 0..100 {
            store.set(format!("key_{}", i), format!("v{}", i), 0);
        }
        store.del("key_0");
        store.compact();
    }

    // Restart: replay the compacted journal from scratch
    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);
    replay(&path, &store);

    assert_eq!(store.entry_count(), 99);
    assert_eq!(store.get("key_0"), None);
    assert_eq!(store.get("key_123"), None);
    assert_eq!(store.get("key_42"), Some("v42".to_string()));
}

// =============================================================================
// Degraded Operation
// =============================================================================

#[test]
fn test_unwritable_journal_degrades_to_memory_only() {
    // A directory path cannot be opened as a file; the store must still
    // serve reads and writes from memory.
    let temp = TempDir::new().unwrap();
    let journal = Arc::new(Journal::open(temp.path()));
    let store = fresh_store(&journal);

    store.set("k".into(), "v".into(), 0);
    assert_eq!(store.get("k"), Some("v".to_string()));
    journal.flush();
}

// =============================================================================
// Direct Append API
// =============================================================================

#[test]
fn test_append_formats() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");
    let journal = Journal::open(&path);

    journal.append_set("k", "v", 0);
    journal.append_set("k", "spaced value", 9);
    journal.append_del("k");
    journal.flush();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, "SET k v\nSET k spaced value EX 9\nDEL k\n");
}

#[test]
fn test_disk_size_tracks_appends() {
    let temp = TempDir::new().unwrap();
    let journal = Journal::open(temp.path().join("wal.log"));

    assert_eq!(journal.disk_size(), 0);
    journal.append_set("key", "value", 0);
    journal.flush();
    assert!(journal.disk_size() > 0);
}

#[test]
fn test_orphan_temp_file_is_ignored() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("wal.log");

    // Simulate a crash between snapshot and rename
    let mut orphan = fs::File::create(temp.path().join("wal.log.tmp")).unwrap();
    writeln!(orphan, "SET stale data").unwrap();
    drop(orphan);

    fs::write(&path, "SET live v\n").unwrap();

    let journal = Arc::new(Journal::open(&path));
    let store = fresh_store(&journal);
    let report = replay(&path, &store);

    assert_eq!(report.applied, 1);
    assert_eq!(store.get("live"), Some("v".to_string()));
    assert_eq!(store.get("stale"), None);
}
