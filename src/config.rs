//! Configuration for PulseKV
//!
//! Centralized configuration with sensible defaults. The defaults match
//! the constants the engine was tuned with; tests shrink the thresholds
//! and intervals to force triggers quickly. Invariants on the tunables
//! are checked by `Config::validate`, which `Engine::open` runs before
//! building anything.

use std::path::PathBuf;

use crate::error::{KvError, Result};

/// Default TCP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default journal path, relative to the working directory
pub const DEFAULT_JOURNAL_PATH: &str = "../data/wal.log";

/// Number of shards in the key map
pub const NUM_SHARDS: usize = 16;

/// Batched writes flushed inline once the buffer reaches this many commands
pub const BATCH_SIZE_THRESHOLD: usize = 50;

/// Batch timer interval (milliseconds)
pub const FLUSH_INTERVAL_MS: u64 = 10;

/// Journal flusher interval (milliseconds)
pub const BACKGROUND_FLUSH_MS: u64 = 100;

/// Seconds between on-disk journal size checks
pub const COMPACTION_CHECK_S: u64 = 60;

/// Journal size that triggers compaction (bytes)
pub const COMPACTION_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Cap on the latency sample ring used for percentiles
pub const LATENCY_SAMPLE_CAP: usize = 10_000;

/// Main configuration for a PulseKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Journal Configuration
    // -------------------------------------------------------------------------
    /// Journal file path; parent directories are created if absent
    pub journal_path: PathBuf,

    /// Journal size that triggers background compaction (bytes)
    pub compaction_threshold: u64,

    /// Interval between journal flushes to the kernel (milliseconds)
    pub background_flush_ms: u64,

    /// Interval between journal size checks (seconds)
    pub compaction_check_s: u64,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Number of shards in the key map
    pub num_shards: usize,

    /// Cap on the latency sample ring
    pub latency_sample_cap: usize,

    // -------------------------------------------------------------------------
    // Batcher Configuration
    // -------------------------------------------------------------------------
    /// Batch size that triggers an inline flush
    pub batch_size_threshold: usize,

    /// Batch timer interval (milliseconds)
    pub flush_interval_ms: u64,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            journal_path: PathBuf::from(DEFAULT_JOURNAL_PATH),
            compaction_threshold: COMPACTION_THRESHOLD,
            background_flush_ms: BACKGROUND_FLUSH_MS,
            compaction_check_s: COMPACTION_CHECK_S,
            num_shards: NUM_SHARDS,
            latency_sample_cap: LATENCY_SAMPLE_CAP,
            batch_size_threshold: BATCH_SIZE_THRESHOLD,
            flush_interval_ms: FLUSH_INTERVAL_MS,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_connections: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the invariants the engine relies on.
    ///
    /// The builder accepts any value so partially built configs stay
    /// ergonomic; `Engine::open` rejects an invalid one here instead of
    /// panicking deeper in a component constructor.
    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(KvError::Config(
                "num_shards must be at least 1".to_string(),
            ));
        }
        if self.batch_size_threshold == 0 {
            return Err(KvError::Config(
                "batch_size_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(KvError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn journal_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.journal_path = path.into();
        self
    }

    pub fn compaction_threshold(mut self, bytes: u64) -> Self {
        self.config.compaction_threshold = bytes;
        self
    }

    pub fn background_flush_ms(mut self, ms: u64) -> Self {
        self.config.background_flush_ms = ms;
        self
    }

    pub fn compaction_check_s(mut self, secs: u64) -> Self {
        self.config.compaction_check_s = secs;
        self
    }

    pub fn num_shards(mut self, shards: usize) -> Self {
        self.config.num_shards = shards;
        self
    }

    pub fn latency_sample_cap(mut self, cap: usize) -> Self {
        self.config.latency_sample_cap = cap;
        self
    }

    pub fn batch_size_threshold(mut self, size: usize) -> Self {
        self.config.batch_size_threshold = size;
        self
    }

    pub fn flush_interval_ms(mut self, ms: u64) -> Self {
        self.config.flush_interval_ms = ms;
        self
    }

    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.max_connections = max;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_shards_rejected() {
        let config = Config::builder().num_shards(0).build();
        assert!(matches!(config.validate(), Err(KvError::Config(_))));
    }

    #[test]
    fn zero_batch_threshold_rejected() {
        let config = Config::builder().batch_size_threshold(0).build();
        assert!(matches!(config.validate(), Err(KvError::Config(_))));
    }

    #[test]
    fn zero_max_connections_rejected() {
        let config = Config::builder().max_connections(0).build();
        assert!(matches!(config.validate(), Err(KvError::Config(_))));
    }
}
