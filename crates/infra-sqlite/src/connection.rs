// SQLite Connection Pool Setup

use crate::error::map_sqlx_error;
use queueserver_core::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const MAX_CONNECTIONS: u32 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a `sqlite://` URL for a database file
pub fn database_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

/// Create SQLite connection pool with WAL mode and optimizations
///
/// In-memory URLs get a single connection: every SQLite connection opens its
/// own private in-memory database.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(map_sqlx_error)?
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { MAX_CONNECTIONS };
    debug!(database_url, max_connections, "Opening SQLite pool");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    Ok(pool)
}
