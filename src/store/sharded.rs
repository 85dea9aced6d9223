//! ShardedStore implementation
//!
//! HashMap shards behind parking_lot mutexes. Shard selection hashes the
//! key with the std DefaultHasher; placement is stable within a process
//! run, and the journal carries no shard identifier, so placement may
//! reshuffle across runs.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::journal::Journal;
use crate::metrics::Metrics;

use super::{now_ms, CacheEntry};

type Shard = Mutex<HashMap<String, CacheEntry>>;

/// N-way partitioned key→entry map with TTL eviction on read
pub struct ShardedStore {
    shards: Vec<Shard>,
    journal: Arc<Journal>,
    metrics: Arc<Metrics>,
}

impl ShardedStore {
    /// `num_shards` must be positive; `Config::validate` enforces this
    /// before the engine constructs a store.
    pub fn new(num_shards: usize, journal: Arc<Journal>, metrics: Arc<Metrics>) -> Self {
        let shards = (0..num_shards)
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards,
            journal,
            metrics,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }

    // -------------------------------------------------------------------------
    // Write path
    // -------------------------------------------------------------------------

    /// Insert or overwrite an entry, then journal the write.
    ///
    /// The shard lock is released before the journal lock is taken.
    pub fn set(&self, key: String, value: String, ttl_seconds: u64) {
        let entry = CacheEntry::with_ttl(value.clone(), ttl_seconds, now_ms());
        {
            let mut shard = self.shards[self.shard_index(&key)].lock();
            shard.insert(key.clone(), entry);
        }
        self.journal.append_set(&key, &value, ttl_seconds);
    }

    /// Remove an entry; journals `DEL` only if the key existed
    pub fn del(&self, key: &str) -> bool {
        let existed = {
            let mut shard = self.shards[self.shard_index(key)].lock();
            shard.remove(key).is_some()
        };
        if existed {
            self.journal.append_del(key);
        }
        existed
    }

    // -------------------------------------------------------------------------
    // Read path
    // -------------------------------------------------------------------------

    /// Look up a key, evicting it in place if expired
    pub fn get(&self, key: &str) -> Option<String> {
        let start = Instant::now();
        let now = now_ms();

        let result = {
            let mut shard = self.shards[self.shard_index(key)].lock();
            match shard
                .get(key)
                .map(|entry| (entry.is_expired(now), entry.value.clone()))
            {
                None => None,
                Some((true, _)) => {
                    shard.remove(key);
                    None
                }
                Some((false, value)) => Some(value),
            }
        };

        self.metrics.record_request();
        match result {
            Some(_) => self.metrics.record_hit(),
            None => self.metrics.record_miss(),
        }
        self.metrics
            .record_latency(start.elapsed().as_micros() as u64);

        result
    }

    /// Batched lookup preserving input order.
    ///
    /// Input indices are grouped by shard and shards are visited in the
    /// order they first appear, so each shard lock is taken once. Hit and
    /// miss counters tick per key; the whole call is one request and one
    /// latency sample.
    pub fn mget(&self, keys: &[String]) -> Vec<Option<String>> {
        let start = Instant::now();

        let mut shard_order: Vec<usize> = Vec::new();
        let mut by_shard: HashMap<usize, Vec<usize>> = HashMap::new();
        for (pos, key) in keys.iter().enumerate() {
            let idx = self.shard_index(key);
            by_shard
                .entry(idx)
                .or_insert_with(|| {
                    shard_order.push(idx);
                    Vec::new()
                })
                .push(pos);
        }

        let mut results: Vec<Option<String>> = vec![None; keys.len()];
        let mut hits = 0u64;

        let now = now_ms();
        for shard_idx in shard_order {
            let mut shard = self.shards[shard_idx].lock();
            for &pos in &by_shard[&shard_idx] {
                let key = &keys[pos];
                match shard
                    .get(key)
                    .map(|entry| (entry.is_expired(now), entry.value.clone()))
                {
                    None => {}
                    Some((true, _)) => {
                        shard.remove(key);
                    }
                    Some((false, value)) => {
                        results[pos] = Some(value);
                        hits += 1;
                    }
                }
            }
        }

        self.metrics.record_request();
        for _ in 0..hits {
            self.metrics.record_hit();
        }
        for _ in 0..(keys.len() as u64 - hits) {
            self.metrics.record_miss();
        }
        self.metrics
            .record_latency(start.elapsed().as_micros() as u64);

        results
    }

    // -------------------------------------------------------------------------
    // Replay path
    // -------------------------------------------------------------------------

    /// Apply a replayed `SET` without re-journaling
    pub fn apply_set(&self, key: String, value: String, ttl_seconds: u64) {
        let entry = CacheEntry::with_ttl(value, ttl_seconds, now_ms());
        let mut shard = self.shards[self.shard_index(&key)].lock();
        shard.insert(key, entry);
    }

    /// Apply a replayed `DEL` without re-journaling
    pub fn apply_del(&self, key: &str) {
        let mut shard = self.shards[self.shard_index(key)].lock();
        shard.remove(key);
    }

    // -------------------------------------------------------------------------
    // Compaction
    // -------------------------------------------------------------------------

    /// Rewrite the journal to exactly the live entries.
    ///
    /// Walks shards one lock at a time while the journal writes the temp
    /// file; writers on other shards proceed concurrently. Surviving TTL
    /// entries are re-journaled with their remaining seconds (rounded up)
    /// so expiry survives the rewrite.
    pub fn compact(&self) {
        self.journal.compact_with(|w| self.write_snapshot(w));
    }

    fn write_snapshot(&self, w: &mut dyn Write) -> io::Result<()> {
        for shard in &self.shards {
            let shard = shard.lock();
            for (key, entry) in shard.iter() {
                let now = now_ms();
                if entry.is_expired(now) {
                    continue;
                }
                if entry.expires_at_ms == 0 {
                    writeln!(w, "SET {} {}", key, entry.value)?;
                } else {
                    let remaining_s = ((entry.expires_at_ms - now) + 999) / 1000;
                    writeln!(w, "SET {} {} EX {}", key, entry.value, remaining_s.max(1))?;
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Total entries across all shards, expired ones included
    pub fn entry_count(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}
