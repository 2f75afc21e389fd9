//! JSON API edge for the fieldops core.
//!
//! Pure handlers live in [`api`]; HTTP plumbing lives in [`server`];
//! credential hashing and session state live in [`auth`].

pub mod api;
pub mod auth;
pub mod server;

use rusqlite::Connection;

/// Per-process state shared by all request handlers.
///
/// The server handles requests sequentially on one connection; SQLite's
/// own locking covers concurrent processes on the same database file.
pub struct AppState {
    pub conn: Connection,
    pub sessions: auth::SessionStore,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            sessions: auth::SessionStore::new(),
        }
    }
}
