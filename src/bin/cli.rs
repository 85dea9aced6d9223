//! PulseKV CLI Client
//!
//! One-shot command-line client for the text protocol. Uses a single TCP
//! stream for sequential write-then-read, the same pattern as redis-cli:
//! encode, send, read one newline-terminated response, print it.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use clap::{Parser, Subcommand};

/// PulseKV CLI
#[derive(Parser, Debug)]
#[command(name = "pulsekv-cli")]
#[command(about = "CLI for the PulseKV key-value cache")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Connection timeout in milliseconds
    #[arg(short, long, default_value = "5000")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair, optionally with a TTL
    Set {
        key: String,
        value: String,
        /// Expiry in seconds
        #[arg(long)]
        ex: Option<u64>,
    },

    /// Get a value by key
    Get { key: String },

    /// Delete a key
    Del { key: String },

    /// Get several values at once
    Mget { keys: Vec<String> },

    /// Print the metrics snapshot
    Stats,

    /// Compact the journal
    Compact,

    /// Drain the server's write batch
    Flush,
}

fn main() {
    let args = Args::parse();

    let request = match &args.command {
        Commands::Set { key, value, ex } => match ex {
            Some(seconds) => format!("SET {} {} EX {}\n", key, value, seconds),
            None => format!("SET {} {}\n", key, value),
        },
        Commands::Get { key } => format!("GET {}\n", key),
        Commands::Del { key } => format!("DEL {}\n", key),
        Commands::Mget { keys } => format!("MGET {}\n", keys.join(" ")),
        Commands::Stats => "STATS\n".to_string(),
        Commands::Compact => "COMPACT\n".to_string(),
        Commands::Flush => "FLUSH\n".to_string(),
    };

    let addr = match args.server.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Invalid server address {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    let mut stream =
        match TcpStream::connect_timeout(&addr, Duration::from_millis(args.timeout)) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Failed to connect to {}: {}", args.server, e);
                std::process::exit(1);
            }
        };

    let _ = stream.set_read_timeout(Some(Duration::from_millis(args.timeout)));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(args.timeout)));
    let _ = stream.set_nodelay(true);

    if let Err(e) = stream.write_all(request.as_bytes()) {
        eprintln!("Failed to send command: {}", e);
        std::process::exit(1);
    }

    let mut reader = BufReader::new(&stream);
    let mut response = String::new();
    match reader.read_line(&mut response) {
        Ok(0) => {
            eprintln!("Server closed the connection");
            std::process::exit(1);
        }
        Ok(_) => {
            print!("{}", response);
            if response.starts_with("ERROR:") {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Failed to read response: {}", e);
            std::process::exit(1);
        }
    }
}
