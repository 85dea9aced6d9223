//! Wire protocol
//!
//! Commands arrive over TCP in one of two framings, detected by the first
//! byte of a request:
//!
//! - Text: `SET <key> <value>[ EX <seconds>| TTL <seconds>]`, `GET <key>`,
//!   `DEL <key>`, `MGET <k1> <k2> ...`, `COMPACT`, `STATS`, `FLUSH` —
//!   newline-terminated, whitespace-delimited, value may contain spaces.
//! - Array (first byte `*`, Redis-style): `*<n>\r\n` followed by `n` bulk
//!   strings `$<len>\r\n<bytes>\r\n`. Accepted verbs: SET (3 bulk
//!   strings, no TTL), GET (2), DEL (2), MGET (>=2), COMPACT (1).
//!
//! Responses are plain text terminated by `\n` in both cases; an
//! array-framed request does not get an array-framed reply.
//!
//! The text form doubles as the journal's on-disk record format.

mod command;
mod parser;
mod response;

pub use command::Command;
pub use parser::{parse_array, parse_text};
pub use response::Response;
