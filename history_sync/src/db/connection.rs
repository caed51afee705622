//! SQLite connection helpers.
//!
//! [`connect_sqlite`] opens a connection and applies the PRAGMAs every writer
//! relies on: WAL journaling, `foreign_keys=ON` and a 5000ms `busy_timeout`.
//!
//! Example:
//! ```no_run
//! use history_sync::db::connection::connect_shared;
//!
//! let path = std::env::temp_dir().join("history_sync_example.db");
//! let _conn = connect_shared(path.to_str().unwrap()).expect("open sqlite");
//! ```

use std::sync::{Arc, Mutex};

use diesel::{Connection, RunQueryDsl, SqliteConnection, sql_query};

/// One connection shared by the sink and the watermark store. Diesel
/// connections are blocking, so holders lock it inside `spawn_blocking`.
pub type SharedConnection = Arc<Mutex<SqliteConnection>>;

/// Open a SQLite connection and apply connection-wide PRAGMAs.
pub fn connect_sqlite(database_url: &str) -> anyhow::Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(strip_scheme(database_url))?;

    sql_query("PRAGMA journal_mode=WAL;").execute(&mut conn)?;
    sql_query("PRAGMA foreign_keys=ON;").execute(&mut conn)?;
    sql_query("PRAGMA busy_timeout=5000;").execute(&mut conn)?;
    Ok(conn)
}

pub fn connect_shared(database_url: &str) -> anyhow::Result<SharedConnection> {
    Ok(Arc::new(Mutex::new(connect_sqlite(database_url)?)))
}

/// `sqlite://path` and `sqlite:path` both name the file `path`.
pub(crate) fn strip_scheme(database_url: &str) -> &str {
    database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url)
}
