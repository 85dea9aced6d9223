//! Tests for the sharded store
//!
//! These tests verify:
//! - Set/get/del semantics and overwrite behavior
//! - Lazy TTL eviction on read
//! - MGET ordering and per-key accounting
//! - Journal records emitted by the write path

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pulsekv::journal::Journal;
use pulsekv::metrics::Metrics;
use pulsekv::store::ShardedStore;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct Fixture {
    _temp: TempDir,
    journal_path: PathBuf,
    journal: Arc<Journal>,
    metrics: Arc<Metrics>,
    store: ShardedStore,
}

fn setup_store() -> Fixture {
    let temp = TempDir::new().unwrap();
    let journal_path = temp.path().join("wal.log");
    let journal = Arc::new(Journal::open(&journal_path));
    let metrics = Arc::new(Metrics::new());
    let store = ShardedStore::new(16, Arc::clone(&journal), Arc::clone(&metrics));
    Fixture {
        _temp: temp,
        journal_path,
        journal,
        metrics,
        store,
    }
}

impl Fixture {
    /// Journal contents, flushed first so buffered appends are visible
    fn journal_lines(&self) -> Vec<String> {
        self.journal.flush();
        fs::read_to_string(&self.journal_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_set_get_roundtrip() {
    let f = setup_store();

    f.store.set("name".into(), "Anish".into(), 0);
    assert_eq!(f.store.get("name"), Some("Anish".to_string()));
}

#[test]
fn test_get_missing_key() {
    let f = setup_store();
    assert_eq!(f.store.get("nope"), None);
}

#[test]
fn test_overwrite() {
    let f = setup_store();

    f.store.set("k".into(), "v1".into(), 0);
    f.store.set("k".into(), "v2".into(), 0);
    assert_eq!(f.store.get("k"), Some("v2".to_string()));
    assert_eq!(f.store.entry_count(), 1);
}

#[test]
fn test_del() {
    let f = setup_store();

    f.store.set("k".into(), "v".into(), 0);
    assert!(f.store.del("k"));
    assert_eq!(f.store.get("k"), None);

    // Idempotent: second delete reports no entry
    assert!(!f.store.del("k"));
}

#[test]
fn test_value_with_spaces() {
    let f = setup_store();

    f.store.set("greeting".into(), "hello world".into(), 0);
    assert_eq!(f.store.get("greeting"), Some("hello world".to_string()));
}

// =============================================================================
// TTL Eviction
// =============================================================================

#[test]
fn test_ttl_entry_visible_before_expiry() {
    let f = setup_store();

    f.store.set("k".into(), "v".into(), 30);
    assert_eq!(f.store.get("k"), Some("v".to_string()));
}

#[test]
fn test_ttl_expiry_evicts_on_read() {
    let f = setup_store();

    f.store.set("k".into(), "v".into(), 1);
    assert_eq!(f.store.get("k"), Some("v".to_string()));

    thread::sleep(Duration::from_millis(1_500));

    assert_eq!(f.store.get("k"), None);
    // Eviction is physical, not just logical
    assert_eq!(f.store.entry_count(), 0);
}

#[test]
fn test_expired_read_counts_as_miss() {
    let f = setup_store();

    f.store.set("k".into(), "v".into(), 1);
    thread::sleep(Duration::from_millis(1_500));
    f.store.get("k");

    assert_eq!(f.metrics.cache_misses(), 1);
    assert_eq!(f.metrics.cache_hits(), 0);
}

// =============================================================================
// MGET
// =============================================================================

#[test]
fn test_mget_preserves_order() {
    let f = setup_store();

    f.store.set("a".into(), "1".into(), 0);
    f.store.set("b".into(), "2".into(), 0);

    let keys: Vec<String> = vec!["a".into(), "c".into(), "b".into()];
    let results = f.store.mget(&keys);

    assert_eq!(
        results,
        vec![Some("1".to_string()), None, Some("2".to_string())]
    );
}

#[test]
fn test_mget_repeated_keys() {
    let f = setup_store();

    f.store.set("a".into(), "1".into(), 0);

    let keys: Vec<String> = vec!["a".into(), "a".into(), "a".into()];
    let results = f.store.mget(&keys);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.as_deref() == Some("1")));
}

#[test]
fn test_mget_accounting_per_key() {
    let f = setup_store();

    f.store.set("a".into(), "1".into(), 0);
    f.store.set("b".into(), "2".into(), 0);

    let keys: Vec<String> = vec!["a".into(), "missing".into(), "b".into()];
    f.store.mget(&keys);

    // One request, one latency sample, per-key hits and misses
    assert_eq!(f.metrics.total_requests(), 1);
    assert_eq!(f.metrics.cache_hits(), 2);
    assert_eq!(f.metrics.cache_misses(), 1);
    assert_eq!(f.metrics.histogram().sample_count(), 1);
}

#[test]
fn test_mget_empty_input() {
    let f = setup_store();
    let results = f.store.mget(&[]);
    assert!(results.is_empty());
}

// =============================================================================
// Read-path Metrics
// =============================================================================

#[test]
fn test_get_metrics() {
    let f = setup_store();

    f.store.set("k".into(), "v".into(), 0);
    f.store.get("k");
    f.store.get("absent");

    assert_eq!(f.metrics.total_requests(), 2);
    assert_eq!(f.metrics.cache_hits(), 1);
    assert_eq!(f.metrics.cache_misses(), 1);
    assert_eq!(f.metrics.histogram().sample_count(), 2);
}

#[test]
fn test_writes_do_not_count_as_requests() {
    let f = setup_store();

    f.store.set("k".into(), "v".into(), 0);
    f.store.del("k");

    assert_eq!(f.metrics.total_requests(), 0);
}

// =============================================================================
// Journal Records
// =============================================================================

#[test]
fn test_write_path_journals_records() {
    let f = setup_store();

    f.store.set("a".into(), "1".into(), 0);
    f.store.set("b".into(), "two words".into(), 45);
    f.store.del("a");
    f.store.del("ghost"); // no entry, no record

    let lines = f.journal_lines();
    assert_eq!(
        lines,
        vec![
            "SET a 1".to_string(),
            "SET b two words EX 45".to_string(),
            "DEL a".to_string(),
        ]
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_disjoint_writers() {
    let f = setup_store();
    let store = Arc::new(f.store);

    let handles: Vec<_> = (0..4)
        .map(|writer| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..200 {
                    store.set(
                        format!("w{}_k{}", writer, i),
                        format!("v{}", i),
                        0,
                    );
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.entry_count(), 800);
    for writer in 0..4 {
        assert_eq!(
            store.get(&format!("w{}_k{}", writer, 199)),
            Some("v199".to_string())
        );
    }
}
