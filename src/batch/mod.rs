//! Write batcher
//!
//! Coalesces write commands from many connections into one shared buffer.
//!
//! ## Responsibilities
//! - Enqueue `SET`/`DEL` operations; reads never pass through here
//! - Flush inline from the calling thread once the buffer reaches the
//!   size threshold
//! - Flush on the engine's 10 ms timer, and on shutdown
//! - Record batch sizes in the metrics sink
//!
//! Clients are acknowledged at enqueue time, before the write reaches the
//! store or the journal. On a crash, writes enqueued within the last
//! timer interval plus the journal's flush window can be lost; that is
//! the documented durability trade. The `FLUSH` command compensates:
//! drains are serialized, so a flush that returns guarantees every
//! previously enqueued write has been applied.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::Metrics;
use crate::store::ShardedStore;

/// A buffered write operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set {
        key: String,
        value: String,
        ttl_seconds: u64,
    },
    Del {
        key: String,
    },
}

/// Shared write buffer with size- and time-triggered draining
pub struct WriteBatcher {
    store: Arc<ShardedStore>,
    metrics: Arc<Metrics>,

    /// Commands awaiting application, in enqueue order
    pending: Mutex<Vec<WriteOp>>,

    /// Serializes drains. Acquired before the pending lock, so a flush
    /// returning means every batch swapped out before it was applied.
    drain_lock: Mutex<()>,

    size_threshold: usize,
}

impl WriteBatcher {
    /// `size_threshold` must be positive; `Config::validate` enforces
    /// this before the engine constructs a batcher.
    pub fn new(store: Arc<ShardedStore>, metrics: Arc<Metrics>, size_threshold: usize) -> Self {
        Self {
            store,
            metrics,
            pending: Mutex::new(Vec::new()),
            drain_lock: Mutex::new(()),
            size_threshold,
        }
    }

    /// Enqueue one write. Reaching the size threshold drains the batch on
    /// this thread.
    pub fn add(&self, op: WriteOp) {
        let at_threshold = {
            let mut pending = self.pending.lock();
            pending.push(op);
            pending.len() >= self.size_threshold
        };

        if at_threshold {
            self.flush();
        }
    }

    /// Drain the current batch and apply it to the store.
    ///
    /// Swaps the buffer out under the batch lock and applies with it
    /// released, so producers keep enqueueing into the fresh buffer.
    pub fn flush(&self) {
        let _drain = self.drain_lock.lock();
        let batch = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return;
        }

        self.metrics.record_batch(batch.len());

        for op in batch {
            match op {
                WriteOp::Set {
                    key,
                    value,
                    ttl_seconds,
                } => self.store.set(key, value, ttl_seconds),
                WriteOp::Del { key } => {
                    self.store.del(&key);
                }
            }
        }
    }

    /// Operations currently buffered
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
