//! Embedded schema migrations.

use anyhow::anyhow;
use diesel::{Connection, SqliteConnection, connection::SimpleConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::db::connection::strip_scheme;

/// Diesel migrations bundled with this crate, applied by [`run_sqlite`].
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies every pending migration to the SQLite database at `url`, switching it to WAL first.
pub fn run_sqlite(url: &str) -> anyhow::Result<()> {
    let mut conn = SqliteConnection::establish(strip_scheme(url))?;
    conn.batch_execute("PRAGMA journal_mode=WAL;")?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!(e))?;

    for version in &applied {
        info!(%version, "applied migration");
    }
    Ok(())
}

/// Runs migrations for `database_url`. Only SQLite is supported; a bare path
/// or a `sqlite:` url are both accepted.
pub fn run_all(database_url: &str) -> anyhow::Result<()> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        anyhow::bail!("Unsupported DATABASE_URL (only SQLite is built in): {database_url}");
    }
    run_sqlite(database_url)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn migrations_apply_twice_on_temp_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        let path = temp.path().to_string_lossy().to_string();

        run_all(&path).expect("first run");
        run_all(&format!("sqlite:{path}")).expect("second run is a no-op");

        let mut conn = SqliteConnection::establish(&path).unwrap();
        conn.batch_execute(
            "INSERT INTO ingest_watermark (dataset, watermark) VALUES ('klines:ETHUSDT:1s', '2024-01-01T00:00:00.000Z')",
        )
        .unwrap();
    }

    #[test]
    fn postgres_urls_are_rejected() {
        let err = run_all("postgres://localhost/history").unwrap_err();
        assert!(err.to_string().contains("only SQLite"));
    }
}
