//! # Connection Options
//!
//! Purpose: Describe where and how to connect, as one immutable snapshot that
//! a connection keeps for the whole of its life (including reconnects).
//!
//! ## Design Principles
//! 1. **Tagged Transport**: TCP and Unix addresses are enum variants, so every
//!    dispatch on the kind is checked for exhaustiveness at compile time.
//! 2. **Zero Is Default**: A zero timeout means "use the transport default".
//! 3. **Serde-Ready**: Options deserialize from any serde format with defaults
//!    for every missing field.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Where the server listens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportAddress {
    /// TCP socket at `host:port`. `host` may be a name or an IP literal.
    Tcp { host: String, port: u16 },
    /// Local domain socket at `path`.
    Unix { path: PathBuf },
}

impl TransportAddress {
    /// TCP address.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        TransportAddress::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Unix domain socket address.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        TransportAddress::Unix { path: path.into() }
    }

    /// Rejects addresses that cannot name a server.
    pub fn validate(&self) -> Result<()> {
        match self {
            TransportAddress::Tcp { host, port } => {
                if host.is_empty() {
                    return Err(Error::InvalidOptions("tcp host is empty".to_string()));
                }
                if *port == 0 {
                    return Err(Error::InvalidOptions("tcp port is 0".to_string()));
                }
            }
            TransportAddress::Unix { path } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::InvalidOptions("unix socket path is empty".to_string()));
                }
            }
        }
        Ok(())
    }
}

impl Default for TransportAddress {
    fn default() -> Self {
        TransportAddress::tcp("127.0.0.1", DEFAULT_PORT)
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Bracket IPv6 literals so the port stays unambiguous.
            TransportAddress::Tcp { host, port } if host.contains(':') => {
                write!(f, "[{}]:{}", host, port)
            }
            TransportAddress::Tcp { host, port } => write!(f, "{}:{}", host, port),
            TransportAddress::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Configuration snapshot for one logical connection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Server address.
    pub transport: TransportAddress,
    /// Connect timeout; zero uses the transport default.
    pub connect_timeout: Duration,
    /// Read/write timeout; zero means block without limit.
    pub socket_timeout: Duration,
    /// Enable TCP keep-alive probes.
    pub keep_alive: bool,
    /// ACL user; empty or `"default"` sends the single-argument AUTH.
    pub user: String,
    /// Password; empty skips authentication.
    pub password: String,
    /// Logical database; 0 skips SELECT.
    pub db: u32,
}

impl ConnectionOptions {
    /// Options for a TCP server with every other field defaulted.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        ConnectionOptions {
            transport: TransportAddress::tcp(host, port),
            ..Default::default()
        }
    }

    /// Options for a Unix socket server with every other field defaulted.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        ConnectionOptions {
            transport: TransportAddress::unix(path),
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }

    /// Returns true if the handshake has to authenticate.
    #[inline]
    pub fn needs_auth(&self) -> bool {
        !self.password.is_empty()
    }

    /// Returns the ACL user to authenticate as, if it is not the default user.
    pub fn acl_user(&self) -> Option<&str> {
        match self.user.as_str() {
            "" | "default" => None,
            user => Some(user),
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            transport: TransportAddress::default(),
            connect_timeout: Duration::ZERO,
            socket_timeout: Duration::ZERO,
            keep_alive: false,
            user: String::new(),
            password: String::new(),
            db: 0,
        }
    }
}

// Hand-written so credentials never end up in logs.
impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ConnectionOptions")
            .field("transport", &self.transport)
            .field("connect_timeout", &self.connect_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .field("keep_alive", &self.keep_alive)
            .field("user", &self.user)
            .field("password", &password)
            .field("db", &self.db)
            .finish()
    }
}
