//! Database initialization
//!
//! Creates the database file and schema on first run; safe to call on an
//! existing database (all DDL is idempotent).

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Initialize database connection pool and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets the account listing read while a login run inserts; the busy
    // timeout covers the short insert at the end of a run.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_user_info_table(&pool).await?;

    Ok(pool)
}

async fn create_user_info_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_info (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            type INTEGER NOT NULL,
            filePath TEXT NOT NULL,
            userName TEXT NOT NULL,
            status INTEGER DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    remove_duplicate_accounts(pool).await?;

    // Separate index so databases created by older backends (no constraint
    // on userName) gain the uniqueness guarantee too.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_user_info_user_name ON user_info (userName)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Older backends inserted without a uniqueness check, so a legacy table can
/// hold several rows per `userName`. Keep the oldest row of each name.
async fn remove_duplicate_accounts(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;

    let duplicates: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT id, userName FROM user_info
        WHERE id NOT IN (SELECT MIN(id) FROM user_info GROUP BY userName)
        ORDER BY id
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    if duplicates.is_empty() {
        return Ok(());
    }

    for (id, user_name) in &duplicates {
        warn!(
            id = id,
            account = %user_name,
            "Removing duplicate account row, keeping the oldest"
        );
        sqlx::query("DELETE FROM user_info WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!("Removed {} duplicate account row(s)", duplicates.len());
    Ok(())
}
