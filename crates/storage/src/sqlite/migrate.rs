use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::SqliteInitError;

/// Schema history, oldest first. Each entry runs in its own transaction and is
/// recorded in `schema_migrations` so it is applied at most once.
const MIGRATIONS: &[(i64, &[&str])] = &[(
    1,
    &[
        r"
        CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        ",
        r"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            nickname TEXT NOT NULL,
            registered_at TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0
                CHECK (progress >= 0 AND progress <= 100)
        );
        ",
    ],
)];

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        ",
    )
    .execute(pool)
    .await?;

    for &(version, statements) in MIGRATIONS {
        if is_applied(pool, version).await? {
            continue;
        }
        apply(pool, version, statements)
            .await
            .map_err(|source| SqliteInitError::Migration { version, source })?;
        debug!(version, "applied sqlite migration");
    }

    Ok(())
}

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
        .bind(version)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

async fn apply(pool: &SqlitePool, version: i64, statements: &[&str]) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2) \
         ON CONFLICT(version) DO NOTHING",
    )
    .bind(version)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}
