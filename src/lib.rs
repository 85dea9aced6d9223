//! # PulseKV
//!
//! An in-memory key-value cache with durable append-only journaling,
//! tuned for ML inference caching and feature-store workloads:
//! - 16-way sharded map with lazy TTL eviction
//! - Append-only text journal with background flushing and online compaction
//! - Write batching that coalesces writes across connections
//! - Latency/hit-rate metrics with percentile export
//! - TCP front end speaking a text protocol and a Redis-style array framing
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (worker pool, blocking I/O)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Command Executor                            │
//! │         (reads direct, writes ack-then-batch)                │
//! └──────┬─────────────────┬────────────────────────────────────┘
//!        │                 │
//!        ▼                 ▼
//! ┌─────────────┐   ┌─────────────┐          ┌─────────────┐
//! │   Batcher   │──▶│ ShardedStore│─────────▶│   Journal   │
//! │ (10ms/50op) │   │ (16 shards) │  append  │ (wal.log)   │
//! └─────────────┘   └─────────────┘          └─────────────┘
//! ```
//!
//! Writes are acknowledged on enqueue, before they reach memory or disk;
//! a read that follows its own acknowledged write may observe the previous
//! value until the batch drains. Clients that need read-after-write issue
//! `FLUSH` first.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod metrics;
pub mod journal;
pub mod store;
pub mod batch;
pub mod protocol;
pub mod engine;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::Config;
pub use engine::Engine;
pub use metrics::Metrics;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PulseKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
