//! Engine
//!
//! Assembles the storage core and executes commands against it.
//!
//! ## Responsibilities
//! - Build metrics, journal, store, and batcher from a `Config`
//! - Replay the journal into the store before accepting commands
//! - Own the two background threads: the journal flusher (periodic
//!   kernel flush + compaction-threshold check) and the batch timer
//! - Dispatch parsed commands: reads hit the store directly, writes are
//!   acknowledged on enqueue into the batcher
//! - Join its threads and drain the batch on `close()`
//!
//! `close()` is the contract for every exit path; `Drop` runs the same
//! shutdown as a fallback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::batch::{WriteBatcher, WriteOp};
use crate::config::Config;
use crate::error::Result;
use crate::journal::{self, Journal};
use crate::metrics::Metrics;
use crate::protocol::{Command, Response};
use crate::store::ShardedStore;

/// The assembled storage engine
pub struct Engine {
    metrics: Arc<Metrics>,
    journal: Arc<Journal>,
    store: Arc<ShardedStore>,
    batcher: Arc<WriteBatcher>,
    running: Arc<AtomicBool>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Open an engine: validate the config, replay the journal, then
    /// start the background flusher and batch-timer threads.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(Metrics::with_sample_cap(config.latency_sample_cap));
        let journal = Arc::new(Journal::open(&config.journal_path));
        let store = Arc::new(ShardedStore::new(
            config.num_shards,
            Arc::clone(&journal),
            Arc::clone(&metrics),
        ));

        let report = journal::replay(journal.path(), &store);
        tracing::info!(
            "Journal replay: {} record(s) applied, {} skipped, {} live entries",
            report.applied,
            report.skipped,
            store.entry_count()
        );

        let batcher = Arc::new(WriteBatcher::new(
            Arc::clone(&store),
            Arc::clone(&metrics),
            config.batch_size_threshold,
        ));

        let running = Arc::new(AtomicBool::new(true));

        let flusher = spawn_journal_flusher(
            &config,
            Arc::clone(&journal),
            Arc::clone(&store),
            Arc::clone(&running),
        )?;
        let timer = spawn_batch_timer(
            config.flush_interval_ms,
            Arc::clone(&batcher),
            Arc::clone(&running),
        )?;

        Ok(Self {
            metrics,
            journal,
            store,
            batcher,
            running,
            background: Mutex::new(vec![flusher, timer]),
        })
    }

    /// Execute a parsed command.
    ///
    /// Writes are acknowledged immediately on enqueue; the batcher
    /// applies them to memory and journal on its own triggers.
    pub fn execute(&self, command: Command) -> Response {
        match command {
            Command::Set {
                key,
                value,
                ttl_seconds,
            } => {
                self.batcher.add(WriteOp::Set {
                    key,
                    value,
                    ttl_seconds,
                });
                Response::Ok
            }
            Command::Del { key } => {
                self.batcher.add(WriteOp::Del { key });
                Response::Ok
            }
            Command::Get { key } => match self.store.get(&key) {
                Some(value) => Response::Value(value),
                None => Response::Nil,
            },
            Command::MGet { keys } => Response::Values(self.store.mget(&keys)),
            Command::Compact => {
                self.store.compact();
                Response::Ok
            }
            Command::Flush => {
                self.batcher.flush();
                Response::Ok
            }
            Command::Stats => Response::Json(self.metrics.to_json()),
            Command::Unknown => Response::unknown_command(),
        }
    }

    /// Shared metrics sink
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Entries currently resident, expired ones included
    pub fn entry_count(&self) -> usize {
        self.store.entry_count()
    }

    /// Stop background threads, drain the batch, flush the journal.
    ///
    /// Idempotent; every exit path must end here.
    pub fn close(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let handles = std::mem::take(&mut *self.background.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("Background thread panicked during shutdown");
            }
        }

        self.batcher.flush();
        self.journal.flush();
        tracing::info!("Engine closed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.close();
    }
}

/// Journal flusher: every `background_flush_ms` push buffered records to
/// the kernel (skipped while a compaction holds the file), and every
/// `compaction_check_s` compare the on-disk size against the threshold.
fn spawn_journal_flusher(
    config: &Config,
    journal: Arc<Journal>,
    store: Arc<ShardedStore>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let flush_ms = config.background_flush_ms;
    let check_s = config.compaction_check_s;
    let threshold = config.compaction_threshold;

    let handle = thread::Builder::new()
        .name("pulsekv-journal-flusher".to_string())
        .spawn(move || {
            let mut last_check = Instant::now();
            while running.load(Ordering::Relaxed) {
                interruptible_sleep(&running, Duration::from_millis(flush_ms));
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                if journal.is_compacting() {
                    continue;
                }
                journal.flush();

                if last_check.elapsed().as_secs() >= check_s {
                    last_check = Instant::now();
                    let size = journal.disk_size();
                    if size > threshold {
                        tracing::info!(
                            "Journal at {} bytes exceeds {} byte threshold, compacting",
                            size,
                            threshold
                        );
                        store.compact();
                    }
                }
            }
        })?;
    Ok(handle)
}

/// Batch timer: drain the write batch every `flush_interval_ms`
fn spawn_batch_timer(
    interval_ms: u64,
    batcher: Arc<WriteBatcher>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("pulsekv-batch-timer".to_string())
        .spawn(move || {
            while running.load(Ordering::Relaxed) {
                interruptible_sleep(&running, Duration::from_millis(interval_ms));
                batcher.flush();
            }
        })?;
    Ok(handle)
}

/// Sleep up to `duration`, waking early once `running` clears so
/// `close()` never waits out a long interval.
fn interruptible_sleep(running: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while running.load(Ordering::Relaxed) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(Duration::from_millis(50)));
    }
}
