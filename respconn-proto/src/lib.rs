//! # respconn-proto - RESP2 wire format
//!
//! Purpose: The wire-format half of the connection layer: the decoded
//! [`Reply`] value, request framing, and a blocking reply decoder that
//! works over any `BufRead`.
//!
//! ## Design Principles
//! 1. **Binary-Safe**: Bulk payloads and status lines are raw bytes.
//! 2. **Buffer Reuse**: Callers own the line and output buffers.
//! 3. **Fail Fast**: Framing violations are reported as soon as they are seen.
//! 4. **Transport-Agnostic**: Nothing here knows about sockets.

pub mod codec;
pub mod error;
pub mod reply;

pub use codec::{encode_command, read_reply, MAX_BULK_LEN, MAX_DEPTH};
pub use error::{DecodeError, ReplyExpectation};
pub use reply::Reply;
