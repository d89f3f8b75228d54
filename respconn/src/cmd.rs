//! Encoders for the commands the connection itself issues.
//!
//! Each function only sends; the caller reads and checks the reply.

use crate::connection::Connection;
use crate::error::Result;

/// Sends `AUTH [user] password`.
pub fn auth(conn: &mut Connection, user: Option<&str>, password: &str) -> Result<()> {
    match user {
        Some(user) => conn.send(&["AUTH", user, password]),
        None => conn.send(&["AUTH", password]),
    }
}

/// Sends `SELECT db`.
pub fn select(conn: &mut Connection, db: u32) -> Result<()> {
    let db = db.to_string();
    conn.send(&["SELECT", db.as_str()])
}

/// Sends `PING`.
pub fn ping(conn: &mut Connection) -> Result<()> {
    conn.send(&["PING"])
}
