//! Database utilities for connections and schema migrations.
//!
//! - [`connection::connect_sqlite`] opens a tuned SQLite connection (WAL,
//!   `foreign_keys=ON`, 5000ms `busy_timeout`); [`connection::connect_shared`]
//!   wraps one for the sink and the watermark store.
//! - [`migrate::run_all`] applies the embedded Diesel migrations.
//!
//! Example:
//! ```no_run
//! use history_sync::db::{connection, migrate};
//!
//! let db_path = std::env::temp_dir().join("history_sync_example.db");
//! migrate::run_all(db_path.to_str().unwrap()).expect("migrations");
//! let _conn = connection::connect_sqlite(db_path.to_str().unwrap()).expect("connect");
//! ```

pub mod connection;
pub mod migrate;
