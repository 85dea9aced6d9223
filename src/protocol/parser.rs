//! Command parsing for the two wire formats
//!
//! `parse_text` handles one newline-terminated text command; the journal
//! replays through it as well. `parse_array` handles the argument vector
//! the connection layer extracts from a Redis-style array frame.
//!
//! Verbs are case-sensitive uppercase. Malformed input of any shape maps
//! to `Command::Unknown`, never an error.

use super::Command;

/// Parse one text-framed command line
pub fn parse_text(input: &str) -> Command {
    let input = input.trim();
    let (verb, rest) = match input.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim_start()),
        None => (input, ""),
    };

    match verb {
        "SET" => parse_set(rest),
        "GET" => match first_token(rest) {
            Some(key) => Command::Get {
                key: key.to_string(),
            },
            None => Command::Unknown,
        },
        "DEL" => match first_token(rest) {
            Some(key) => Command::Del {
                key: key.to_string(),
            },
            None => Command::Unknown,
        },
        "MGET" => {
            let keys: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
            if keys.is_empty() {
                Command::Unknown
            } else {
                Command::MGet { keys }
            }
        }
        "COMPACT" => Command::Compact,
        "STATS" => Command::Stats,
        "FLUSH" => Command::Flush,
        _ => Command::Unknown,
    }
}

/// `SET <key> <value>[ EX <seconds>| TTL <seconds>]`
///
/// The value is the entire remainder after the key and may contain
/// spaces; only a trailing `EX <int>` or `TTL <int>` pair is peeled off
/// as the TTL clause.
fn parse_set(rest: &str) -> Command {
    let (key, after_key) = match rest.split_once(char::is_whitespace) {
        Some((key, after)) => (key, after.trim()),
        None => return Command::Unknown,
    };

    let mut value = after_key;
    let mut ttl_seconds = 0u64;

    if let Some((head, last)) = rsplit_token(value) {
        if let Ok(seconds) = last.parse::<u64>() {
            if let Some((before_clause, marker)) = rsplit_token(head) {
                if marker == "EX" || marker == "TTL" {
                    value = before_clause;
                    ttl_seconds = seconds;
                }
            }
        }
    }

    if value.is_empty() {
        return Command::Unknown;
    }

    Command::Set {
        key: key.to_string(),
        value: value.to_string(),
        ttl_seconds,
    }
}

/// Parse the argument vector of an array-framed command.
///
/// Arities are fixed: SET takes exactly key and value (no TTL clause in
/// this framing), GET/DEL exactly one key, MGET at least one, COMPACT
/// none. Keys must not contain whitespace and values must not contain a
/// newline, or the journal record they produce would not replay.
pub fn parse_array(args: &[String]) -> Command {
    let verb = match args.first() {
        Some(v) => v.as_str(),
        None => return Command::Unknown,
    };

    match (verb, args.len()) {
        ("SET", 3) => {
            let key = &args[1];
            let value = &args[2];
            if !valid_key(key) || value.contains('\n') || value.is_empty() {
                return Command::Unknown;
            }
            Command::Set {
                key: key.clone(),
                value: value.clone(),
                ttl_seconds: 0,
            }
        }
        ("GET", 2) if valid_key(&args[1]) => Command::Get {
            key: args[1].clone(),
        },
        ("DEL", 2) if valid_key(&args[1]) => Command::Del {
            key: args[1].clone(),
        },
        ("MGET", n) if n >= 2 => {
            if !args[1..].iter().all(|k| valid_key(k)) {
                return Command::Unknown;
            }
            Command::MGet {
                keys: args[1..].to_vec(),
            }
        }
        ("COMPACT", 1) => Command::Compact,
        _ => Command::Unknown,
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(char::is_whitespace)
}

fn first_token(s: &str) -> Option<&str> {
    s.split_whitespace().next()
}

/// Split off the last whitespace-separated token: `"a b  c"` → `("a b", "c")`.
/// A single token splits against the empty head, so a bare `EX <n>`
/// remainder is recognized as a clause with no value.
fn rsplit_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_end();
    if s.is_empty() {
        return None;
    }
    match s.rfind(char::is_whitespace) {
        Some(i) => Some((s[..i].trim_end(), &s[i + 1..])),
        None => Some(("", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsplit_token_basics() {
        assert_eq!(rsplit_token("a b c"), Some(("a b", "c")));
        assert_eq!(rsplit_token("a"), Some(("", "a")));
        assert_eq!(rsplit_token(""), None);
    }

    #[test]
    fn set_with_clause_but_no_value_is_malformed() {
        assert_eq!(parse_text("SET k EX 10"), Command::Unknown);
    }

    #[test]
    fn set_value_keeps_spaces() {
        assert_eq!(
            parse_text("SET greeting hello world\n"),
            Command::Set {
                key: "greeting".into(),
                value: "hello world".into(),
                ttl_seconds: 0,
            }
        );
    }

    #[test]
    fn set_strips_only_trailing_ttl_clause() {
        assert_eq!(
            parse_text("SET k some EX ample EX 30"),
            Command::Set {
                key: "k".into(),
                value: "some EX ample".into(),
                ttl_seconds: 30,
            }
        );
    }
}
