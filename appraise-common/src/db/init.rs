//! Database initialization
//!
//! Creates the SQLite file on first run and the HIT tables idempotently.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    create_tables(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema (tests, dry runs)
pub async fn init_memory_database() -> Result<SqlitePool> {
    // A single connection that is never reaped: the database lives and dies with it
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_tables(&pool).await?;

    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers while a judge submission is written
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

/// Create all tables (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_hits_table(pool).await?;
    create_hit_users_table(pool).await?;
    create_segments_table(pool).await?;
    create_results_table(pool).await?;
    Ok(())
}

async fn create_hits_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hits (
            hit_id TEXT PRIMARY KEY CHECK (length(hit_id) = 8),
            block_id INTEGER NOT NULL,
            language_pair TEXT NOT NULL,
            task_type TEXT NOT NULL,
            hit_xml TEXT NOT NULL,
            source_file TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_hits_ordering ON hits (block_id, language_pair, hit_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_hit_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hit_users (
            hit_id TEXT NOT NULL REFERENCES hits(hit_id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            PRIMARY KEY (hit_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_segments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hit_id TEXT NOT NULL REFERENCES hits(hit_id) ON DELETE CASCADE,
            item_xml TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_segments_hit ON segments (hit_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            segment_id INTEGER NOT NULL REFERENCES segments(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            duration_ms INTEGER,
            raw_result TEXT NOT NULL CHECK (length(raw_result) > 0),
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_results_segment_user ON results (segment_id, user_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_tables() {
        let pool = init_memory_database().await.unwrap();

        for table in ["hits", "hit_users", "segments", "results"] {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_tables(&pool).await.unwrap();
        create_tables(&pool).await.unwrap();
    }
}
