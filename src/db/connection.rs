use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Error, Pool, Sqlite};

/// Create a SQLite connection pool
///
/// # Parameters
/// - `database_path`: path of the database file, created if missing
/// - `max_connections`: upper bound on pooled connections
///
/// The API and the worker share the file, so WAL mode and a busy timeout keep
/// concurrent writers from failing outright.
pub async fn get_connection(
    database_path: &str,
    max_connections: u32,
) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Private in-memory database, one per call
///
/// Held on a single connection that never expires, since each SQLite memory
/// connection sees its own database.
pub async fn connect_in_memory() -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}
