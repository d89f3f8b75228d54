//! # RESP2 Framing and Decoding
//!
//! Purpose: Frame client commands and decode server replies, keeping
//! allocations under control.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Blocking Reads**: "Need more data" is absorbed by the `BufRead`; the
//!    decoder returns only complete replies or an error.
//! 3. **Bounded Input**: Oversized bulk lengths and deep nesting are rejected
//!    before any allocation is made for them.

use std::io::{self, BufRead, Read};

use bytes::{BufMut, BytesMut};

use crate::error::DecodeError;
use crate::reply::Reply;

/// Largest bulk string accepted from the server (512 MiB).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Bulk buffers start at most this large and grow as payload bytes arrive.
const BULK_PREALLOC: usize = 64 * 1024;

/// Deepest aggregate nesting accepted from the server.
pub const MAX_DEPTH: usize = 64;

/// Appends a RESP2 array-of-bulk-strings command to `out`.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], out: &mut BytesMut) {
    let body: usize = args.iter().map(|arg| arg.as_ref().len() + 16).sum();
    out.reserve(body + 16);

    out.put_u8(b'*');
    push_usize(out, args.len());
    out.put_slice(b"\r\n");
    for arg in args {
        let arg = arg.as_ref();
        out.put_u8(b'$');
        push_usize(out, arg.len());
        out.put_slice(b"\r\n");
        out.put_slice(arg);
        out.put_slice(b"\r\n");
    }
}

/// Reads exactly one reply from the buffered reader.
///
/// `line_buf` is scratch space reused across calls.
pub fn read_reply<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> Result<Reply, DecodeError> {
    read_reply_at(reader, line_buf, 0)
}

fn read_reply_at<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> Result<Reply, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::Malformed("reply nested too deep"));
    }

    read_line(reader, line_buf)?;
    let Some((&prefix, rest)) = line_buf.split_first() else {
        return Err(DecodeError::Malformed("empty reply line"));
    };

    match prefix {
        b'+' => Ok(Reply::Status(rest.to_vec())),
        b'-' => Ok(Reply::Error(rest.to_vec())),
        b':' => Ok(Reply::Integer(parse_i64(rest)?)),
        b'$' => {
            let len = parse_i64(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_i64(rest)?;
            read_array(reader, len, line_buf, depth)
        }
        _ => Err(DecodeError::Malformed("invalid reply type prefix")),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> Result<Reply, DecodeError> {
    if len < 0 {
        return Ok(Reply::Bulk(None));
    }
    let len = usize::try_from(len).map_err(|_| DecodeError::Malformed("bulk string too long"))?;
    if len > MAX_BULK_LEN {
        return Err(DecodeError::Malformed("bulk string too long"));
    }

    // A length header alone must not commit us to a large allocation.
    let mut data = Vec::with_capacity(len.min(BULK_PREALLOC));
    let read = (&mut *reader).take(len as u64).read_to_end(&mut data)?;
    if read < len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-reply").into());
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != *b"\r\n" {
        return Err(DecodeError::Malformed("bulk string missing CRLF"));
    }
    Ok(Reply::Bulk(Some(data)))
}

fn read_array<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> Result<Reply, DecodeError> {
    if len < 0 {
        return Ok(Reply::Array(None));
    }

    // Capacity is capped so a hostile length cannot force a huge allocation.
    let mut items = Vec::with_capacity(usize::try_from(len).map_or(1024, |len| len.min(1024)));
    for _ in 0..len {
        items.push(read_reply_at(reader, line_buf, depth + 1)?);
    }
    Ok(Reply::Array(Some(items)))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server").into());
    }
    if buf.last() != Some(&b'\n') {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed mid-reply").into());
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(DecodeError::Malformed("reply line missing CRLF"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_i64(data: &[u8]) -> Result<i64, DecodeError> {
    let (negative, digits) = match data.split_first() {
        Some((&b'-', digits)) => (true, digits),
        _ => (false, data),
    };
    if digits.is_empty() {
        return Err(DecodeError::Malformed("invalid integer"));
    }

    let mut value: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(DecodeError::Malformed("invalid integer"));
        }
        let digit = (b - b'0') as i64;
        // Accumulate negatively so i64::MIN round-trips.
        value = value
            .checked_mul(10)
            .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
            .ok_or(DecodeError::Malformed("integer overflow"))?;
    }
    Ok(value)
}

fn push_usize(out: &mut BytesMut, mut value: usize) {
    // Write digits into a small stack buffer to avoid heap allocations.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    buf[..len].reverse();
    out.put_slice(&buf[..len]);
}
