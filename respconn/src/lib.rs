//! # respconn - Blocking RESP Connection Layer
//!
//! Purpose: Own the lifecycle of a single logical connection to a
//! Redis-compatible server: connect over TCP or a Unix socket, apply socket
//! options, authenticate and select a database, then exchange commands and
//! replies.
//!
//! ## Design Principles
//! 1. **RAII Ownership**: A [`Connection`] exclusively owns its socket; dropping
//!    it closes the socket.
//! 2. **Strong Guarantees**: Construction and [`Connection::reconnect`] either
//!    fully succeed or leave nothing (or the previous state) behind.
//! 3. **Explicit Failure Classes**: [`Error::is_connection_error`] means
//!    "reconnect", [`Error::is_reply_error`] means "the command failed".
//! 4. **Synchronous**: No background threads; every call blocks for at most
//!    the configured timeout.
//!
//! ```no_run
//! use respconn::{Connection, ConnectionOptions};
//!
//! let opts = ConnectionOptions::tcp("127.0.0.1", 6379).with_db(2);
//! let mut conn = Connection::connect(&opts)?;
//! conn.send(&["SET", "key", "value"])?;
//! let reply = conn.recv()?;
//! # let _ = reply;
//! # Ok::<(), respconn::Error>(())
//! ```

mod args;
pub mod cmd;
mod connection;
mod connector;
mod error;
mod options;
mod timeval;
mod transport;

pub use args::CommandArgs;
pub use connection::Connection;
pub use connector::Connector;
pub use error::{Error, Result};
pub use options::{ConnectionOptions, TransportAddress, DEFAULT_PORT};
pub use respconn_proto::{reply, Reply};
pub use timeval::{explicit_timeout, WireTimeval};
pub use transport::{Transport, KEEPALIVE_IDLE};
