//! # Connector
//!
//! Purpose: Turn [`ConnectionOptions`] into an open, timeout-configured,
//! keep-alive-configured [`Transport`], or fail.
//!
//! ## Design Principles
//! 1. **Exhaustive Dispatch**: The transport kind is matched, never looked up.
//! 2. **Default Unless Positive**: A timeout reaches the socket only when it
//!    is strictly positive after truncation to microseconds.
//! 3. **All-Or-Nothing**: The handle is returned only after every socket
//!    option has been applied.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::options::{ConnectionOptions, TransportAddress};
use crate::timeval::explicit_timeout;
use crate::transport::{Stream, Transport};

/// Opens transports for one set of options.
#[derive(Debug, Clone, Copy)]
pub struct Connector<'a> {
    opts: &'a ConnectionOptions,
}

impl<'a> Connector<'a> {
    pub fn new(opts: &'a ConnectionOptions) -> Self {
        Connector { opts }
    }

    /// Connects and applies socket timeout and keep-alive.
    pub fn connect(&self) -> Result<Transport> {
        self.opts.transport.validate()?;

        let transport = Transport::new(self.open_stream()?);

        self.set_socket_timeout(&transport)?;

        self.enable_keep_alive(&transport)?;

        Ok(transport)
    }

    /// Connect timeout to pass to the socket, `None` for the transport default.
    pub fn connect_timeout(&self) -> Option<Duration> {
        explicit_timeout(self.opts.connect_timeout).map(|tv| tv.to_duration())
    }

    /// Read/write timeout to pass to the socket, `None` for the transport default.
    pub fn socket_timeout(&self) -> Option<Duration> {
        explicit_timeout(self.opts.socket_timeout).map(|tv| tv.to_duration())
    }

    fn open_stream(&self) -> Result<Stream> {
        let server = &self.opts.transport;
        debug!(
            server = %server,
            connect_timeout = ?self.connect_timeout(),
            socket_timeout = ?self.socket_timeout(),
            "connecting"
        );

        let stream = match server {
            TransportAddress::Tcp { host, port } => self.connect_tcp(host, *port).map(Stream::Tcp),
            TransportAddress::Unix { path } => self.connect_unix(path),
        };
        stream.map_err(|err| Error::Connection {
            context: "failed to connect",
            kind: err.kind(),
            message: format!("{}: {}", server, err),
        })
    }

    fn connect_tcp(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = match self.connect_timeout() {
            Some(timeout) => connect_tcp_timeout(host, port, timeout)?,
            None => TcpStream::connect((host, port))?,
        };
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    #[cfg(unix)]
    fn connect_unix(&self, path: &Path) -> io::Result<Stream> {
        let stream = match self.connect_timeout() {
            Some(timeout) => connect_unix_timeout(path, timeout)?,
            None => UnixStream::connect(path)?,
        };
        Ok(Stream::Unix(stream))
    }

    #[cfg(not(unix))]
    fn connect_unix(&self, _path: &Path) -> io::Result<Stream> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix domain sockets are not supported on this platform",
        ))
    }

    fn set_socket_timeout(&self, transport: &Transport) -> Result<()> {
        match self.socket_timeout() {
            Some(timeout) => transport.set_timeouts(Some(timeout)),
            None => Ok(()),
        }
    }

    fn enable_keep_alive(&self, transport: &Transport) -> Result<()> {
        if !self.opts.keep_alive {
            return Ok(());
        }
        transport.enable_keep_alive()
    }
}

/// Tries every resolved address in order, like `TcpStream::connect` does,
/// bounding each attempt by `timeout`.
fn connect_tcp_timeout(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "could not resolve to any address")
    }))
}

#[cfg(unix)]
fn connect_unix_timeout(path: &Path, timeout: Duration) -> io::Result<UnixStream> {
    use socket2::{Domain, SockAddr, Socket, Type};

    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.connect_timeout(&SockAddr::unix(path)?, timeout)?;
    Ok(UnixStream::from(socket))
}
