//! # Reply Values
//!
//! Purpose: Represent one decoded server reply and the small set of checks
//! the connection layer needs to classify it.

use std::fmt;

use crate::error::ReplyExpectation;

/// Decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// +OK or +PONG style responses.
    Status(Vec<u8>),
    /// -ERR ... responses.
    Error(Vec<u8>),
    /// :123 responses.
    Integer(i64),
    /// $... bulk strings, with None for nil.
    Bulk(Option<Vec<u8>>),
    /// *... arrays, with None for the nil array.
    Array(Option<Vec<Reply>>),
}

impl Reply {
    /// Returns the server's error text for error replies.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Reply::Error(message) => Some(String::from_utf8_lossy(message).into_owned()),
            _ => None,
        }
    }

    /// Returns the status text for status replies.
    pub fn as_status(&self) -> Option<&[u8]> {
        match self {
            Reply::Status(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(text) => write!(f, "status reply `{}`", String::from_utf8_lossy(text)),
            Reply::Error(text) => write!(f, "error reply `{}`", String::from_utf8_lossy(text)),
            Reply::Integer(value) => write!(f, "integer reply {}", value),
            Reply::Bulk(None) => write!(f, "nil reply"),
            Reply::Bulk(Some(data)) => write!(f, "bulk reply ({}B)", data.len()),
            Reply::Array(None) => write!(f, "nil array reply"),
            Reply::Array(Some(items)) => write!(f, "array reply ({} items)", items.len()),
        }
    }
}

/// Returns true when the server answered with an error reply.
#[inline]
pub fn is_error(reply: &Reply) -> bool {
    matches!(reply, Reply::Error(_))
}

/// Returns true for the canonical `+OK` status reply.
#[inline]
pub fn is_status_ok(reply: &Reply) -> bool {
    reply.as_status() == Some(b"OK".as_slice())
}

/// Requires the canonical `+OK` status reply.
pub fn expect_ok_status(reply: &Reply) -> Result<(), ReplyExpectation> {
    expect_status(reply, "OK")
}

/// Requires a status reply whose text equals `status` exactly.
pub fn expect_status(reply: &Reply, status: &'static str) -> Result<(), ReplyExpectation> {
    if reply.as_status() == Some(status.as_bytes()) {
        return Ok(());
    }
    Err(ReplyExpectation {
        expected: status,
        got: reply.to_string(),
    })
}
