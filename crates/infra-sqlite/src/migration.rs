// Schema Migrations
// Versioned SQL files applied in order, each inside its own transaction

use crate::error::map_sqlx_error;
use queueserver_core::error::Result;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Latest schema version shipped with this build
pub const SCHEMA_VERSION: i64 = 1;

/// (version, description, sql)
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "jobs table and dispatch indexes",
    include_str!("../migrations/001_initial_schema.sql"),
)];

/// Bring the database up to `SCHEMA_VERSION`
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = current_version(pool).await?;
    let pending: Vec<_> = MIGRATIONS.iter().filter(|(v, _, _)| *v > current).collect();

    if pending.is_empty() {
        debug!(version = current, "Schema up to date");
        return Ok(());
    }

    for (version, description, sql) in pending {
        info!(version = *version, description = *description, "Applying migration");
        apply_migration(pool, sql).await?;
    }

    info!(from = current, to = SCHEMA_VERSION, "Schema migrated");
    Ok(())
}

/// Highest applied version, 0 for a fresh database
async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
    )
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;

    if tables == 0 {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(version.unwrap_or(0))
}

async fn apply_migration(pool: &SqlitePool, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(map_sqlx_error)?;

    for statement in statements(sql) {
        sqlx::query(&statement)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
    }

    tx.commit().await.map_err(map_sqlx_error)
}

/// Split a migration file into executable statements, dropping `--` comments
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .map(strip_comment)
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn strip_comment(line: &str) -> &str {
    match line.find("--") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn test_fresh_database_is_version_zero() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 0);

        run_migrations(&pool).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), SCHEMA_VERSION);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_latest_migration_matches_schema_version() {
        let latest = MIGRATIONS.iter().map(|(v, _, _)| *v).max();
        assert_eq!(latest, Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_statements_strip_comments() {
        let sql = "-- header\nCREATE TABLE t (a INTEGER, -- note\n b TEXT);\n\n;";
        assert_eq!(statements(sql), vec!["CREATE TABLE t (a INTEGER, \n b TEXT)"]);
        assert_eq!(strip_comment("id INTEGER"), "id INTEGER");
    }
}
