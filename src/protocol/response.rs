//! Response definitions
//!
//! Every response is plain text terminated by `\n`, regardless of the
//! request framing.

/// A response to send to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `OK`
    Ok,

    /// A present value
    Value(String),

    /// `(nil)` for an absent or expired key
    Nil,

    /// MGET results in input order; `None` renders as `(nil)`
    Values(Vec<Option<String>>),

    /// STATS snapshot, already serialized
    Json(String),

    /// `ERROR: <message>`
    Error(String),
}

impl Response {
    pub fn unknown_command() -> Self {
        Response::Error("Unknown command".to_string())
    }

    /// Render as the newline-terminated wire form
    pub fn into_wire(self) -> String {
        match self {
            Response::Ok => "OK\n".to_string(),
            Response::Value(v) => format!("{}\n", v),
            Response::Nil => "(nil)\n".to_string(),
            Response::Values(values) => {
                let joined = values
                    .iter()
                    .map(|v| v.as_deref().unwrap_or("(nil)"))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{}\n", joined)
            }
            Response::Json(json) => format!("{}\n", json),
            Response::Error(msg) => format!("ERROR: {}\n", msg),
        }
    }
}
