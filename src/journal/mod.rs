//! Append-only journal
//!
//! Durability for the sharded store through text-format logging.
//!
//! ## Responsibilities
//! - Append one `SET`/`DEL` record per line under the journal write lock
//! - Flush buffered records to the kernel (no fsync on the append path)
//! - Rewrite the file online via snapshot-then-atomic-rename compaction
//! - Replay records into the store on startup (see `replay`)
//!
//! ## File Format
//! ```text
//! SET <key> <value>\n
//! SET <key> <value> EX <seconds>\n
//! DEL <key>\n
//! ```
//! The records are exactly the text wire commands, so the journal can be
//! replayed through the same parser that serves connections. No header,
//! no checksums, no length prefixes.
//!
//! A journal that cannot be opened degrades the store to memory-only
//! operation with a logged warning; it never aborts the process.

mod replay;

pub use replay::{replay, ReplayReport};

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Append-only journal over a single file handle.
///
/// The handle lives behind the journal write lock; `None` means the file
/// could not be opened and appends are dropped.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
    compacting: AtomicBool,
}

impl Journal {
    /// Open or create the journal at `path`, creating parent directories.
    ///
    /// Open failures degrade to a journal-less instance rather than
    /// erroring; the store keeps serving from memory.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!("Could not create journal directory {}: {}", parent.display(), e);
                }
            }
        }

        let writer = match open_append(&path) {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!("Could not open journal file {}: {}", path.display(), e);
                None
            }
        };

        Self {
            path,
            writer: Mutex::new(writer),
            compacting: AtomicBool::new(false),
        }
    }

    /// Journal file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a compaction is currently rewriting the file
    pub fn is_compacting(&self) -> bool {
        self.compacting.load(Ordering::Acquire)
    }

    /// Append a `SET` record; `ttl_seconds == 0` means no expiry clause
    pub fn append_set(&self, key: &str, value: &str, ttl_seconds: u64) {
        if ttl_seconds > 0 {
            self.append_line(format_args!("SET {} {} EX {}", key, value, ttl_seconds));
        } else {
            self.append_line(format_args!("SET {} {}", key, value));
        }
    }

    /// Append a `DEL` record
    pub fn append_del(&self, key: &str) {
        self.append_line(format_args!("DEL {}", key));
    }

    fn append_line(&self, record: std::fmt::Arguments<'_>) {
        let mut guard = self.writer.lock();
        if let Some(writer) = guard.as_mut() {
            if let Err(e) = writeln!(writer, "{}", record) {
                tracing::warn!("Journal append failed: {}", e);
            }
        }
    }

    /// Flush buffered records to the kernel.
    ///
    /// No fsync: durability is the OS write buffer plus this periodic
    /// flush, by contract.
    pub fn flush(&self) {
        let mut guard = self.writer.lock();
        if let Some(writer) = guard.as_mut() {
            if let Err(e) = writer.flush() {
                tracing::warn!("Journal flush failed: {}", e);
            }
        }
    }

    /// Current on-disk size in bytes, 0 if the file is absent
    pub fn disk_size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Rewrite the journal from a snapshot of live entries.
    ///
    /// `write_snapshot` receives the temp-file writer and is responsible
    /// for emitting one record per live entry; the store implementation
    /// walks its shards one lock at a time so writers on other shards
    /// proceed concurrently.
    ///
    /// Protocol: raise the compacting flag (the background flusher skips
    /// its flush while it is up), write `<path>.tmp`, then under the
    /// journal write lock close the live handle, rename temp over the
    /// journal, and reopen in append mode. The rename is the atomic
    /// commit; on any failure the old journal remains authoritative.
    pub fn compact_with<F>(&self, write_snapshot: F)
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        // A second caller (COMPACT command racing the background check)
        // backs off instead of interleaving renames.
        if self
            .compacting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Compaction already in progress, skipping");
            return;
        }

        let temp_path = temp_path_for(&self.path);
        let written = write_temp_snapshot(&temp_path, write_snapshot);

        match written {
            Ok(()) => {
                let mut guard = self.writer.lock();

                // Close the live handle before the swap
                *guard = None;

                if let Err(e) = fs::rename(&temp_path, &self.path) {
                    tracing::warn!("Failed to rename temp journal during compaction: {}", e);
                }

                // Reopen in append mode either way; after a failed rename
                // this is the old journal, still authoritative.
                *guard = match open_append(&self.path) {
                    Ok(w) => Some(w),
                    Err(e) => {
                        tracing::warn!("Could not reopen journal after compaction: {}", e);
                        None
                    }
                };
            }
            Err(e) => {
                tracing::warn!("Compaction aborted, journal unchanged: {}", e);
                let _ = fs::remove_file(&temp_path);
            }
        }

        self.compacting.store(false, Ordering::Release);
    }
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

fn write_temp_snapshot<F>(temp_path: &Path, write_snapshot: F) -> io::Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let file = File::create(temp_path)?;
    let mut writer = BufWriter::new(file);
    write_snapshot(&mut writer)?;
    writer.flush()
}
