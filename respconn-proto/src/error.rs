//! Error types for RESP framing and reply expectations.

use std::io;

/// Failure to decode one reply from the byte stream.
///
/// Both variants leave the stream in an unknown position, so the owner of
/// the stream must stop using it.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The underlying reader failed (timeout, reset, EOF mid-reply).
    #[error("{0}")]
    Io(#[from] io::Error),

    /// The bytes on the wire do not follow the RESP grammar.
    #[error("protocol error: {0}")]
    Malformed(&'static str),
}

/// A well-formed reply that does not have the shape the caller required.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected}, got {got}")]
pub struct ReplyExpectation {
    /// Short description of the required reply.
    pub expected: &'static str,
    /// Short description of the reply actually received.
    pub got: String,
}
