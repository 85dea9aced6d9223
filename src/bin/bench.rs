//! PulseKV Benchmark Client
//!
//! Drives the server with N concurrent clients issuing SET requests over
//! persistent connections and reports aggregate throughput.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::thread;
use std::time::Instant;

use clap::Parser;

/// PulseKV benchmark
#[derive(Parser, Debug)]
#[command(name = "pulsekv-bench")]
#[command(about = "Throughput benchmark for a running PulseKV server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Concurrent client connections
    #[arg(short, long, default_value = "10")]
    clients: usize,

    /// Requests per client
    #[arg(short, long, default_value = "1000")]
    requests: usize,
}

fn run_client(server: &str, client_id: usize, requests: usize) -> usize {
    let mut stream = match TcpStream::connect(server) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Client {}: failed to connect: {}", client_id, e);
            return 0;
        }
    };
    let _ = stream.set_nodelay(true);

    let read_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Client {}: failed to clone stream: {}", client_id, e);
            return 0;
        }
    };
    let mut reader = BufReader::new(read_half);
    let mut response = String::new();
    let mut completed = 0;

    for i in 0..requests {
        let cmd = format!("SET key_{}_{} value_{}\n", client_id, i, i);
        if stream.write_all(cmd.as_bytes()).is_err() {
            break;
        }
        response.clear();
        match reader.read_line(&mut response) {
            Ok(n) if n > 0 => completed += 1,
            _ => break,
        }
    }

    completed
}

fn main() {
    let args = Args::parse();

    println!(
        "Starting benchmark: {} clients, {} requests each...",
        args.clients, args.requests
    );

    let start = Instant::now();

    let handles: Vec<_> = (0..args.clients)
        .map(|client_id| {
            let server = args.server.clone();
            let requests = args.requests;
            thread::spawn(move || run_client(&server, client_id, requests))
        })
        .collect();

    let completed: usize = handles
        .into_iter()
        .map(|h| h.join().unwrap_or(0))
        .sum();

    let elapsed = start.elapsed().as_secs_f64();
    let rps = if elapsed > 0.0 {
        completed as f64 / elapsed
    } else {
        0.0
    };

    println!("------------------------------");
    println!("Total Requests: {}", completed);
    println!("Total Time:     {:.3} s", elapsed);
    println!("Requests/sec:   {}", rps as u64);
    println!("------------------------------");
}
