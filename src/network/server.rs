//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.

use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{KvError, Result};

use super::Connection;

/// Message sent to worker threads
enum WorkerMessage {
    /// New client connection to handle
    NewConnection(TcpStream),
    /// Signal to shutdown
    Shutdown,
}

/// TCP server for PulseKV
///
/// ## Architecture
/// - Caller's thread accepts connections (non-blocking, polls shutdown)
/// - Worker thread pool handles client I/O, one connection per worker
/// - Shared Engine reference for all workers
pub struct Server {
    config: Config,

    engine: Arc<Engine>,

    /// Bound listener; populated by `bind`
    listener: Option<TcpListener>,

    work_sender: Option<Sender<WorkerMessage>>,

    workers: Vec<JoinHandle<()>>,

    shutdown: Arc<AtomicBool>,

    active_connections: Arc<AtomicUsize>,
}

/// Detached handle for signaling shutdown from another thread
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
}

impl ServerHandle {
    /// Ask the accept loop to stop; in-flight connections wind down as
    /// their workers observe the flag.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Server {
    /// Create a new server over an already-opened engine
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config,
            engine,
            listener: None,
            work_sender: None,
            workers: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the configured address without starting the accept loop.
    ///
    /// Separate from `run` so callers (and tests binding port 0) can
    /// learn the local address before serving.
    pub fn bind(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr).map_err(|e| {
            KvError::Network(format!(
                "Failed to bind to {}: {}",
                self.config.listen_addr, e
            ))
        })?;

        // Non-blocking so the accept loop can poll the shutdown flag
        listener.set_nonblocking(true)?;

        tracing::info!("Server listening on {}", self.config.listen_addr);
        self.listener = Some(listener);
        Ok(())
    }

    /// Bound address, once `bind` has run
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Handle for signaling shutdown from another thread
    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Serve until shutdown is signaled (blocking)
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }

        let num_workers = worker_count();
        let (sender, receiver) = bounded::<WorkerMessage>(self.config.max_connections);
        self.work_sender = Some(sender);

        tracing::info!("Starting {} worker threads", num_workers);

        for worker_id in 0..num_workers {
            let worker = Worker {
                id: worker_id,
                receiver: receiver.clone(),
                engine: Arc::clone(&self.engine),
                shutdown: Arc::clone(&self.shutdown),
                active_connections: Arc::clone(&self.active_connections),
            };
            let handle = thread::Builder::new()
                .name(format!("pulsekv-worker-{}", worker_id))
                .spawn(move || worker.run())
                .map_err(|e| KvError::Network(format!("Failed to spawn worker: {}", e)))?;

            self.workers.push(handle);
        }

        self.accept_loop();
        self.cleanup();

        Ok(())
    }

    fn accept_loop(&mut self) {
        let listener = self.listener.as_ref().expect("bind precedes accept");
        let sender = self.work_sender.as_ref().expect("workers precede accept");

        while !self.shutdown.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, addr)) => {
                    let current = self.active_connections.load(Ordering::Relaxed);
                    if current >= self.config.max_connections {
                        tracing::warn!(
                            "Connection limit reached ({}/{}), rejecting {}",
                            current,
                            self.config.max_connections,
                            addr
                        );
                        drop(stream);
                        continue;
                    }

                    tracing::debug!("Accepted connection from {}", addr);

                    if let Err(e) = sender.send(WorkerMessage::NewConnection(stream)) {
                        tracing::error!("Failed to dispatch connection: {}", e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    if !self.shutdown.load(Ordering::Relaxed) {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
        }
    }

    fn cleanup(&mut self) {
        tracing::info!("Shutting down server...");

        if let Some(sender) = &self.work_sender {
            for _ in 0..self.workers.len() {
                let _ = sender.send(WorkerMessage::Shutdown);
            }
        }

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Worker thread panicked");
            }
        }

        tracing::info!("Server shutdown complete");
    }

    /// Signal the server to shut down gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Relaxed)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

/// Worker thread that handles client connections
struct Worker {
    id: usize,
    receiver: Receiver<WorkerMessage>,
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Worker {
    fn run(self) {
        tracing::debug!("Worker {} started", self.id);

        loop {
            match self.receiver.recv() {
                Ok(WorkerMessage::NewConnection(stream)) => {
                    self.handle_connection(stream);
                }
                Ok(WorkerMessage::Shutdown) => {
                    tracing::debug!("Worker {} received shutdown signal", self.id);
                    break;
                }
                Err(_) => {
                    tracing::debug!("Worker {} channel closed", self.id);
                    break;
                }
            }
        }

        tracing::debug!("Worker {} stopped", self.id);
    }

    fn handle_connection(&self, stream: TcpStream) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);

        let result = Connection::new(
            stream,
            Arc::clone(&self.engine),
            Arc::clone(&self.shutdown),
        )
        .and_then(|mut conn| conn.handle());

        if let Err(e) = result {
            tracing::debug!("Connection ended with error: {}", e);
        }

        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Worker pool size: hardware concurrency, fallback 8
fn worker_count() -> usize {
    thread::available_parallelism().map(|p| p.get()).unwrap_or(8)
}
