//! # Connection
//!
//! Purpose: One logical, authenticated connection to a server, with blocking
//! send/receive and all-or-nothing reconnect.
//!
//! ## Design Principles
//! 1. **No Half-Open State**: Construction either returns a connection that
//!    finished its handshake or an error; nothing partial escapes.
//! 2. **Build Aside, Then Replace**: `reconnect` builds a complete replacement
//!    before touching `self`, so a failed reconnect changes nothing.
//! 3. **Two Failure Channels**: Transport failures break the connection;
//!    server error replies do not.
//! 4. **Single Owner**: No internal locking. Share across threads only behind
//!    external exclusion (for example a pool checkout or a mutex).

use std::time::Instant;

use respconn_proto::reply;
use respconn_proto::Reply;
use tracing::debug;

use crate::args::CommandArgs;
use crate::cmd;
use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::options::ConnectionOptions;
use crate::transport::Transport;

/// Blocking connection to a RESP server.
#[derive(Debug)]
pub struct Connection {
    transport: Transport,
    last_active: Instant,
    opts: ConnectionOptions,
}

impl Connection {
    /// Connects, then authenticates and selects the database as `opts` asks.
    pub fn connect(opts: &ConnectionOptions) -> Result<Self> {
        let transport = Connector::new(opts).connect()?;

        let mut conn = Connection {
            transport,
            last_active: Instant::now(),
            opts: opts.clone(),
        };

        conn.transport.check_pending_error();
        conn.transport.ensure_usable("failed to connect to server")?;

        conn.set_options()?;

        debug!(server = %conn.opts.transport, db = conn.opts.db, "connected");
        Ok(conn)
    }

    /// Replaces this connection with a fresh one built from the same options.
    ///
    /// On failure `self` is left exactly as it was, old socket included.
    pub fn reconnect(&mut self) -> Result<()> {
        let fresh = Connection::connect(&self.opts)?;
        // The old transport is released when `stale` goes out of scope.
        let stale = std::mem::replace(self, fresh);
        debug!(server = %self.opts.transport, was_broken = stale.broken(), "reconnected");
        Ok(())
    }

    /// Frames `args` as one command and writes it.
    ///
    /// Replies are not read here; call [`recv`](Self::recv) once per command,
    /// in send order.
    pub fn send<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<()> {
        if args.is_empty() {
            return Err(Error::InvalidCommand("command has no arguments"));
        }

        self.transport.write_command(args)?;

        debug_assert!(!self.transport.broken());
        Ok(())
    }

    /// Sends an incrementally built argument vector.
    pub fn send_args(&mut self, args: CommandArgs<'_>) -> Result<()> {
        self.send(args.as_slice())
    }

    /// Blocks until the next reply arrives.
    ///
    /// A server error reply becomes [`Error::Server`] and leaves the
    /// connection usable.
    pub fn recv(&mut self) -> Result<Reply> {
        let reply = self.transport.read_reply()?;

        debug_assert!(!self.transport.broken(), "transport broke after a complete reply");

        if reply::is_error(&reply) {
            return Err(Error::Server(reply.error_message().unwrap_or_default()));
        }
        Ok(reply)
    }

    /// Round-trips `PING`, requiring `+PONG`.
    pub fn ping(&mut self) -> Result<()> {
        cmd::ping(self)?;
        let reply = self.recv()?;
        reply::expect_status(&reply, "PONG")?;
        Ok(())
    }

    /// True once the transport failed; only [`reconnect`](Self::reconnect)
    /// makes the connection usable again.
    #[inline]
    pub fn broken(&self) -> bool {
        self.transport.broken()
    }

    /// When this connection was established.
    ///
    /// Set at connect and reconnect only, not on every command.
    #[inline]
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    #[inline]
    pub fn options(&self) -> &ConnectionOptions {
        &self.opts
    }

    /// `host:port` for TCP, the socket path for Unix.
    pub fn server_info(&self) -> String {
        self.opts.transport.to_string()
    }

    fn set_options(&mut self) -> Result<()> {
        self.auth()?;

        self.select_db()
    }

    fn auth(&mut self) -> Result<()> {
        if !self.opts.needs_auth() {
            return Ok(());
        }

        let user = self.opts.acl_user().map(str::to_owned);
        let password = self.opts.password.clone();
        debug!(user = user.as_deref().unwrap_or("default"), "authenticating");

        cmd::auth(self, user.as_deref(), &password)?;
        let reply = self.recv()?;
        reply::expect_ok_status(&reply)?;
        Ok(())
    }

    fn select_db(&mut self) -> Result<()> {
        let db = self.opts.db;
        if db == 0 {
            return Ok(());
        }

        debug!(db, "selecting database");
        cmd::select(self, db)?;
        let reply = self.recv()?;
        reply::expect_ok_status(&reply)?;
        Ok(())
    }
}
