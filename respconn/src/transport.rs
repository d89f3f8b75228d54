//! # Transport Handle
//!
//! Purpose: Own one open socket plus its read/write buffers, and remember
//! when it has failed.
//!
//! ## Design Principles
//! 1. **Sticky Failure**: The first I/O or framing failure marks the handle
//!    broken; every later call fails fast with the first error text.
//! 2. **Buffer Reuse**: The buffered reader, line buffer and output buffer
//!    live as long as the handle.
//! 3. **One Socket Kind Per Variant**: TCP and Unix streams share every code
//!    path through [`Stream`].

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use bytes::BytesMut;
use respconn_proto::{encode_command, read_reply, Reply};
use socket2::{SockRef, TcpKeepalive};
use tracing::warn;

use crate::error::{Error, Result};

/// Idle time before the first keep-alive probe.
pub const KEEPALIVE_IDLE: Duration = Duration::from_secs(15);

/// Stream socket of either transport kind.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn set_timeouts(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => {
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)
            }
            #[cfg(unix)]
            Stream::Unix(stream) => {
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)
            }
        }
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        match self {
            Stream::Tcp(stream) => stream.take_error(),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.take_error(),
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

/// Failure that broke the handle.
#[derive(Debug, Clone)]
struct Fault {
    kind: io::ErrorKind,
    message: String,
}

/// Open connection to the server.
///
/// "Broken" is a state of the handle, not its absence: a broken transport
/// still owns its socket until it is dropped.
#[derive(Debug)]
pub struct Transport {
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<Stream>,
    line_buf: Vec<u8>,
    write_buf: BytesMut,
    fault: Option<Fault>,
}

impl Transport {
    pub(crate) fn new(stream: Stream) -> Self {
        Transport {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: BytesMut::with_capacity(256),
            fault: None,
        }
    }

    /// True after an unrecoverable I/O or framing failure.
    #[inline]
    pub fn broken(&self) -> bool {
        self.fault.is_some()
    }

    #[cfg(test)]
    fn error_text(&self) -> Option<&str> {
        self.fault.as_ref().map(|fault| fault.message.as_str())
    }

    pub(crate) fn stream(&self) -> &Stream {
        self.reader.get_ref()
    }

    /// Applies the same read and write timeout. `None` blocks without limit.
    pub(crate) fn set_timeouts(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream()
            .set_timeouts(timeout)
            .map_err(|err| Error::io("failed to set socket timeout", &err))
    }

    /// Enables TCP keep-alive probes. Unix sockets have no peer to probe, so
    /// asking for keep-alive on one is an error.
    pub(crate) fn enable_keep_alive(&self) -> Result<()> {
        match self.stream() {
            Stream::Tcp(stream) => {
                let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_IDLE);
                SockRef::from(stream)
                    .set_tcp_keepalive(&keepalive)
                    .map_err(|err| Error::io("failed to enable keep alive option", &err))
            }
            #[cfg(unix)]
            Stream::Unix(_) => Err(Error::Connection {
                context: "failed to enable keep alive option",
                kind: io::ErrorKind::Unsupported,
                message: "keep alive requires a tcp connection".to_string(),
            }),
        }
    }

    /// Picks up an error the socket reported asynchronously (`SO_ERROR`).
    pub(crate) fn check_pending_error(&mut self) {
        let pending = self.stream().take_error();
        match pending {
            Ok(None) => {}
            Ok(Some(err)) | Err(err) => self.mark_broken(err.kind(), err.to_string()),
        }
    }

    /// Frames `args` and writes them to the socket.
    pub(crate) fn write_command<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        self.ensure_usable("connection is broken")?;

        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        let written = stream
            .write_all(&self.write_buf)
            .and_then(|()| stream.flush());
        self.write_buf.clear();

        written.map_err(|err| {
            self.mark_broken(err.kind(), err.to_string());
            Error::io("failed to send command", &err)
        })
    }

    /// Blocks until one complete reply has been read.
    pub(crate) fn read_reply(&mut self) -> Result<Reply> {
        self.ensure_usable("connection is broken")?;

        read_reply(&mut self.reader, &mut self.line_buf).map_err(|err| {
            let error = Error::decode("failed to get reply", &err);
            if let Error::Connection { kind, message, .. } = &error {
                self.mark_broken(*kind, message.clone());
            }
            error
        })
    }

    /// Fails with the stored fault, reported under `context`, once broken.
    pub(crate) fn ensure_usable(&self, context: &'static str) -> Result<()> {
        match &self.fault {
            None => Ok(()),
            Some(fault) => Err(Error::Connection {
                context,
                kind: fault.kind,
                message: fault.message.clone(),
            }),
        }
    }

    fn mark_broken(&mut self, kind: io::ErrorKind, message: String) {
        if self.fault.is_some() {
            return;
        }
        warn!(error = %message, "transport broken");
        // The stream position is unknown now; stop the peer from waiting on us.
        let _ = self.stream().shutdown();
        self.fault = Some(Fault { kind, message });
    }
}
