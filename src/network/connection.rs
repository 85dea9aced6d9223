//! Connection Handler
//!
//! Serves one client for the lifetime of its socket: reads a frame,
//! parses it, executes, writes the response. The framing is detected per
//! request from the first byte (`*` introduces an array frame), so one
//! connection may mix both formats.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;
use crate::error::{KvError, Result};
use crate::protocol::{parse_array, parse_text, Command};

/// Poll interval for the shutdown flag while blocked on a read
const READ_POLL_MS: u64 = 250;

/// Handles a single client connection
pub struct Connection {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    engine: Arc<Engine>,
    shutdown: Arc<AtomicBool>,
    peer: String,
}

impl Connection {
    pub fn new(stream: TcpStream, engine: Arc<Engine>, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_read_timeout(Some(Duration::from_millis(READ_POLL_MS)))?;
        let _ = stream.set_nodelay(true);

        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            stream,
            reader,
            engine,
            shutdown,
            peer,
        })
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer
    }

    /// Serve the connection until the client disconnects or the server
    /// shuts down. A disconnect is a clean exit, not an error.
    pub fn handle(&mut self) -> Result<()> {
        let mut line = String::new();
        loop {
            if self.read_frame_line(&mut line)? == 0 {
                tracing::debug!("Client {} disconnected", self.peer);
                return Ok(());
            }

            let command = if line.starts_with('*') {
                self.read_array_frame(&line)?
            } else {
                parse_text(&line)
            };

            let response = self.engine.execute(command).into_wire();
            self.stream.write_all(response.as_bytes())?;
        }
    }

    /// Read one line, riding out read timeouts so the worker can poll
    /// the shutdown flag. Returns 0 on EOF or shutdown; a partial line
    /// interrupted by a timeout is preserved and completed on the next
    /// pass.
    fn read_frame_line(&mut self, buf: &mut String) -> Result<usize> {
        buf.clear();
        loop {
            match self.reader.read_line(buf) {
                // EOF; a torn trailing fragment is dropped
                Ok(0) => return Ok(if buf.ends_with('\n') { buf.len() } else { 0 }),
                Ok(_) => return Ok(buf.len()),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        return Ok(0);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read the rest of an array frame given its `*<n>` header line.
    ///
    /// Each argument is a `$<len>` line followed by the payload line.
    /// Malformed framing yields `Command::Unknown` and the connection
    /// keeps serving; a disconnect mid-frame ends the connection.
    fn read_array_frame(&mut self, header: &str) -> Result<Command> {
        let count: usize = match header[1..].trim().parse() {
            Ok(n) if n > 0 => n,
            _ => return Ok(Command::Unknown),
        };

        let mut args = Vec::with_capacity(count);
        let mut line = String::new();
        for _ in 0..count {
            if self.read_frame_line(&mut line)? == 0 {
                return Err(KvError::Protocol(
                    "connection closed inside an array frame".to_string(),
                ));
            }
            let len_header = line.trim();
            let declared = match len_header.strip_prefix('$').map(|s| s.parse::<usize>()) {
                Some(Ok(n)) => n,
                _ => return Ok(Command::Unknown),
            };

            if self.read_frame_line(&mut line)? == 0 {
                return Err(KvError::Protocol(
                    "connection closed inside an array frame".to_string(),
                ));
            }
            let payload = line.trim_end_matches(['\r', '\n']);
            if payload.len() != declared {
                return Ok(Command::Unknown);
            }
            args.push(payload.to_string());
        }

        Ok(parse_array(&args))
    }
}
