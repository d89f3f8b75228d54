use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use respconn::{CommandArgs, Connection, ConnectionOptions, Error, Reply};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Server side of one accepted connection.
struct Peer<S: Read + Write> {
    reader: BufReader<S>,
    writer: S,
}

impl Peer<TcpStream> {
    fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        let reader = BufReader::new(stream.try_clone().expect("clone"));
        Peer {
            reader,
            writer: stream,
        }
    }
}

#[cfg(unix)]
impl Peer<std::os::unix::net::UnixStream> {
    fn accept_unix(listener: &std::os::unix::net::UnixListener) -> Self {
        let (stream, _) = listener.accept().expect("accept");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        let reader = BufReader::new(stream.try_clone().expect("clone"));
        Peer {
            reader,
            writer: stream,
        }
    }
}

impl<S: Read + Write> Peer<S> {
    /// Reads one command; `None` once the client closed the connection.
    fn read_command(&mut self) -> io::Result<Option<Vec<Vec<u8>>>> {
        let mut line = Vec::new();
        if read_line(&mut self.reader, &mut line)?.is_none() {
            return Ok(None);
        }
        if line.first() != Some(&b'*') {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "expected array"));
        }
        let count = parse_usize(&line[1..])?;
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            read_line(&mut self.reader, &mut line)?
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "eof"))?;
            if line.first() != Some(&b'$') {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "expected bulk"));
            }
            let len = parse_usize(&line[1..])?;
            let mut data = vec![0u8; len];
            self.reader.read_exact(&mut data)?;
            let mut crlf = [0u8; 2];
            self.reader.read_exact(&mut crlf)?;
            if crlf != *b"\r\n" {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "missing crlf"));
            }
            args.push(data);
        }
        Ok(Some(args))
    }

    fn expect(&mut self, expected: &[&str]) {
        let args = self
            .read_command()
            .expect("read command")
            .expect("client closed before sending");
        let args: Vec<String> = args
            .iter()
            .map(|arg| String::from_utf8_lossy(arg).into_owned())
            .collect();
        assert_eq!(args, expected);
    }

    fn expect_closed(&mut self) {
        match self.read_command() {
            Ok(None) => {}
            // A reset is as good as an orderly close here.
            Err(err) if err.kind() == io::ErrorKind::ConnectionReset => {}
            other => panic!("expected the client to close, got {:?}", other),
        }
    }

    fn reply(&mut self, raw: &[u8]) {
        self.writer.write_all(raw).expect("write reply");
        self.writer.flush().expect("flush reply");
    }
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid length"))
}

/// Binds an ephemeral TCP port and runs `script` with the listener.
fn spawn_tcp_server<F>(script: F) -> (u16, JoinHandle<()>)
where
    F: FnOnce(TcpListener) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    (port, thread::spawn(move || script(listener)))
}

fn tcp_options(port: u16) -> ConnectionOptions {
    ConnectionOptions::tcp("127.0.0.1", port)
        .with_connect_timeout(Duration::from_secs(1))
        .with_socket_timeout(Duration::from_secs(2))
}

#[cfg(unix)]
#[test]
fn unix_connect_without_handshake_sends_nothing() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("test.sock");
    let listener = std::os::unix::net::UnixListener::bind(&path).expect("bind");

    let server = thread::spawn(move || {
        let mut peer = Peer::accept_unix(&listener);
        // The first bytes on the wire are the caller's own command.
        peer.expect(&["PING"]);
        peer.reply(b"+PONG\r\n");
        peer.expect_closed();
    });

    let opts = ConnectionOptions::unix(&path);
    let mut conn = Connection::connect(&opts).expect("connect");
    assert!(!conn.broken());
    assert_eq!(conn.server_info(), path.display().to_string());
    conn.ping().expect("ping");
    drop(conn);

    server.join().expect("server");
}

#[cfg(unix)]
#[test]
fn unix_keep_alive_fails_construction() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("keepalive.sock");
    let _listener = std::os::unix::net::UnixListener::bind(&path).expect("bind");

    let opts = ConnectionOptions::unix(&path).with_keep_alive(true);
    let err = Connection::connect(&opts).unwrap_err();
    assert!(err.is_connection_error());
    assert!(err.to_string().starts_with("failed to enable keep alive option"));
}

#[test]
fn tcp_handshake_sends_auth_then_select() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["AUTH", "secret"]);
        peer.reply(b"+OK\r\n");
        peer.expect(&["SELECT", "2"]);
        peer.reply(b"+OK\r\n");
        peer.expect(&["GET", "key"]);
        peer.reply(b"$5\r\nvalue\r\n");
        peer.expect_closed();
    });

    let opts = tcp_options(port).with_password("secret").with_db(2);
    let mut conn = Connection::connect(&opts).expect("connect");
    assert_eq!(conn.server_info(), format!("127.0.0.1:{}", port));

    conn.send(&["GET", "key"]).expect("send");
    assert_eq!(conn.recv().expect("recv"), Reply::Bulk(Some(b"value".to_vec())));
    drop(conn);

    server.join().expect("server");
}

#[test]
fn acl_user_sends_two_argument_auth() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["AUTH", "app", "secret"]);
        peer.reply(b"+OK\r\n");
        // db 0: no SELECT follows.
        peer.expect_closed();
    });

    let opts = tcp_options(port).with_user("app").with_password("secret");
    let conn = Connection::connect(&opts).expect("connect");
    drop(conn);

    server.join().expect("server");
}

#[test]
fn rejected_auth_fails_construction() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["AUTH", "wrong"]);
        peer.reply(b"-WRONGPASS invalid username-password pair\r\n");
        // SELECT must not be attempted after a failed AUTH.
        peer.expect_closed();
    });

    let opts = tcp_options(port).with_password("wrong").with_db(3);
    let err = Connection::connect(&opts).unwrap_err();
    assert!(err.is_reply_error());
    match err {
        Error::Server(message) => assert!(message.starts_with("WRONGPASS")),
        other => panic!("unexpected error: {:?}", other),
    }

    server.join().expect("server");
}

#[test]
fn non_ok_select_reply_fails_construction() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["SELECT", "5"]);
        peer.reply(b":1\r\n");
        peer.expect_closed();
    });

    let opts = tcp_options(port).with_db(5);
    let err = Connection::connect(&opts).unwrap_err();
    assert!(err.is_reply_error());
    assert!(matches!(err, Error::UnexpectedReply(_)));

    server.join().expect("server");
}

#[test]
fn error_reply_keeps_connection_usable() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["FOO"]);
        peer.reply(b"-ERR unknown command 'FOO'\r\n");
        peer.expect(&["PING"]);
        peer.reply(b"+PONG\r\n");
        peer.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    conn.send(&["FOO"]).expect("send");
    let err = conn.recv().unwrap_err();
    assert!(err.is_reply_error());
    assert_eq!(err.to_string(), "server error: ERR unknown command 'FOO'");
    assert!(!conn.broken());

    conn.ping().expect("ping after error reply");
    drop(conn);

    server.join().expect("server");
}

#[test]
fn peer_close_during_recv_breaks_until_reconnect() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut first = Peer::accept(&listener);
        first.expect(&["GET", "key"]);
        drop(first);

        let mut second = Peer::accept(&listener);
        second.expect(&["PING"]);
        second.reply(b"+PONG\r\n");
        second.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    let established = conn.last_active();
    conn.send(&["GET", "key"]).expect("send");

    let err = conn.recv().unwrap_err();
    assert!(err.is_connection_error());
    assert!(conn.broken());

    assert!(conn.send(&["PING"]).unwrap_err().is_connection_error());
    assert!(conn.recv().unwrap_err().is_connection_error());
    assert!(conn.broken());

    conn.reconnect().expect("reconnect");
    assert!(!conn.broken());
    assert!(conn.last_active() >= established);
    conn.ping().expect("ping after reconnect");
    drop(conn);

    server.join().expect("server");
}

#[test]
fn recv_timeout_breaks_connection() {
    init_tracing();
    let (done_tx, done_rx) = mpsc::channel::<()>();
    let (port, server) = spawn_tcp_server(move |listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["BLPOP", "queue", "0"]);
        // Hold the socket open without replying.
        let _ = done_rx.recv_timeout(Duration::from_secs(5));
    });

    let opts = tcp_options(port).with_socket_timeout(Duration::from_millis(100));
    let mut conn = Connection::connect(&opts).expect("connect");
    conn.send(&["BLPOP", "queue", "0"]).expect("send");

    let started = Instant::now();
    let err = conn.recv().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(err.is_connection_error());
    assert!(err.is_timeout());
    assert!(conn.broken());

    let _ = done_tx.send(());
    server.join().expect("server");
}

#[test]
fn failed_reconnect_leaves_connection_intact() {
    init_tracing();
    let (closed_tx, closed_rx) = mpsc::channel::<()>();
    let (port, server) = spawn_tcp_server(move |listener| {
        let mut peer = Peer::accept(&listener);
        // Stop accepting so the reconnect attempt is refused.
        drop(listener);
        closed_tx.send(()).expect("signal");
        peer.expect(&["PING"]);
        peer.reply(b"+PONG\r\n");
        peer.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    closed_rx.recv().expect("listener closed");
    let established = conn.last_active();

    let err = conn.reconnect().unwrap_err();
    assert!(err.is_connection_error());

    assert!(!conn.broken());
    assert_eq!(conn.last_active(), established);
    assert_eq!(conn.server_info(), format!("127.0.0.1:{}", port));
    conn.ping().expect("old connection still usable");
    drop(conn);

    server.join().expect("server");
}

#[test]
fn reconnect_repeats_handshake_and_releases_old_socket() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut first = Peer::accept(&listener);
        first.expect(&["AUTH", "secret"]);
        first.reply(b"+OK\r\n");
        first.expect(&["SELECT", "1"]);
        first.reply(b"+OK\r\n");

        let mut second = Peer::accept(&listener);
        second.expect(&["AUTH", "secret"]);
        second.reply(b"+OK\r\n");
        second.expect(&["SELECT", "1"]);
        second.reply(b"+OK\r\n");

        first.expect_closed();
        second.expect(&["PING"]);
        second.reply(b"+PONG\r\n");
        second.expect_closed();
    });

    let opts = tcp_options(port).with_password("secret").with_db(1);
    let mut conn = Connection::connect(&opts).expect("connect");
    conn.reconnect().expect("reconnect");
    assert_eq!(conn.options(), &opts);
    conn.ping().expect("ping");
    drop(conn);

    server.join().expect("server");
}

#[test]
fn command_args_and_slices_frame_identically() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        for _ in 0..2 {
            peer.expect(&["HSET", "h", "f", "v"]);
            peer.reply(b":1\r\n");
        }
        peer.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    conn.send(&["HSET", "h", "f", "v"]).expect("send slice");
    assert_eq!(conn.recv().expect("recv"), Reply::Integer(1));

    let field = String::from("f");
    let value = b"v".to_vec();
    let mut args = CommandArgs::new();
    args.push("HSET").push("h").push(&field).push(&value);
    conn.send_args(args).expect("send args");
    assert_eq!(conn.recv().expect("recv"), Reply::Integer(1));
    drop(conn);

    server.join().expect("server");
}

#[test]
fn replies_arrive_in_send_order() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["SET", "a", "1"]);
        peer.expect(&["GET", "a"]);
        peer.reply(b"+OK\r\n$1\r\n1\r\n");
        peer.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    conn.send(&["SET", "a", "1"]).expect("send");
    conn.send(&["GET", "a"]).expect("send");
    assert_eq!(conn.recv().expect("recv"), Reply::Status(b"OK".to_vec()));
    assert_eq!(conn.recv().expect("recv"), Reply::Bulk(Some(b"1".to_vec())));
    drop(conn);

    server.join().expect("server");
}

#[test]
fn malformed_reply_breaks_connection() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["GET", "a"]);
        peer.reply(b"%1\r\n");
        peer.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    conn.send(&["GET", "a"]).expect("send");
    let err = conn.recv().unwrap_err();
    assert!(err.is_connection_error());
    assert!(!err.is_timeout());
    assert!(conn.broken());
    drop(conn);

    server.join().expect("server");
}

#[test]
fn empty_command_is_rejected_without_io() {
    init_tracing();
    let (port, server) = spawn_tcp_server(|listener| {
        let mut peer = Peer::accept(&listener);
        peer.expect(&["PING"]);
        peer.reply(b"+PONG\r\n");
        peer.expect_closed();
    });

    let mut conn = Connection::connect(&tcp_options(port)).expect("connect");
    let empty: [&str; 0] = [];
    assert!(matches!(conn.send(&empty), Err(Error::InvalidCommand(_))));
    assert!(matches!(conn.send_args(CommandArgs::new()), Err(Error::InvalidCommand(_))));
    assert!(!conn.broken());
    conn.ping().expect("ping");
    drop(conn);

    server.join().expect("server");
}

#[test]
fn connect_to_closed_port_returns_no_connection() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let err = Connection::connect(&ConnectionOptions::tcp("127.0.0.1", port)).unwrap_err();
    assert!(err.is_connection_error());
    assert!(!err.is_reply_error());
}
