//! # Error Taxonomy
//!
//! Callers must be able to tell "rebuild the connection" apart from "the
//! command failed but the connection is fine". [`Error::is_connection_error`]
//! answers the first, [`Error::is_reply_error`] the second.

use std::io;

use respconn_proto::{DecodeError, ReplyExpectation};

/// Result type for the connection layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure. The connection is unusable until reconnected.
    #[error("{context}: {message}")]
    Connection {
        /// What the connection was doing when it failed.
        context: &'static str,
        /// Kind of the underlying I/O failure.
        kind: io::ErrorKind,
        /// Native error text of the transport.
        message: String,
    },

    /// Server returned an error reply; the connection stays usable.
    #[error("server error: {0}")]
    Server(String),

    /// Reply was well formed but not what the command requires.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(#[from] ReplyExpectation),

    /// Options rejected before any I/O was attempted.
    #[error("invalid connection options: {0}")]
    InvalidOptions(String),

    /// Command rejected before any I/O was attempted.
    #[error("invalid command: {0}")]
    InvalidCommand(&'static str),
}

impl Error {
    pub(crate) fn io(context: &'static str, err: &io::Error) -> Self {
        Error::Connection {
            context,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub(crate) fn decode(context: &'static str, err: &DecodeError) -> Self {
        let kind = match err {
            DecodeError::Io(err) => err.kind(),
            DecodeError::Malformed(_) => io::ErrorKind::InvalidData,
        };
        Error::Connection {
            context,
            kind,
            message: err.to_string(),
        }
    }

    /// True when the transport failed and the connection must be rebuilt.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// True when the server rejected or answered unexpectedly, but the
    /// transport is still healthy.
    pub fn is_reply_error(&self) -> bool {
        matches!(self, Error::Server(_) | Error::UnexpectedReply(_))
    }

    /// True when a connect, read or write ran into its configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Connection {
                kind: io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock,
                ..
            }
        )
    }
}
