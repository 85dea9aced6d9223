//! PulseKV Server Binary
//!
//! Starts the TCP server for PulseKV.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use pulsekv::network::Server;
use pulsekv::{Config, Engine};

/// PulseKV Server
#[derive(Parser, Debug)]
#[command(name = "pulsekv-server")]
#[command(about = "In-memory key-value cache with append-only journaling")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Journal file path
    #[arg(short, long, default_value = "../data/wal.log")]
    journal: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pulsekv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("PulseKV Server v{}", pulsekv::VERSION);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Journal path: {}", args.journal);

    let config = Config::builder()
        .listen_addr(&args.listen)
        .journal_path(&args.journal)
        .max_connections(args.max_connections)
        .build();

    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = Server::new(config, Arc::clone(&engine));
    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        engine.close();
        std::process::exit(1);
    }

    engine.close();
    tracing::info!("Server stopped");
}
