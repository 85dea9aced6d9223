//! Network Module
//!
//! TCP front end for the engine.
//!
//! ## Responsibilities
//! - Accept connections and dispatch them to a worker thread pool
//! - Per-connection framing: text lines and Redis-style array frames
//! - Route parsed commands into the engine and write text responses
//!
//! ## Architecture
//! The accept loop runs non-blocking on the caller's thread and hands
//! sockets to workers over a bounded crossbeam channel. Each connection
//! is served cooperatively on a single worker with blocking I/O; short
//! read timeouts let workers observe the shutdown flag.

mod connection;
mod server;

pub use connection::Connection;
pub use server::{Server, ServerHandle};
