//! Database initialization for the signal event store

use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use classpulse_common::Result;

pub mod signals;

/// Initialize database connection and create tables if needed
///
/// Many students submit for the same class at once, so the pool and WAL
/// mode are set up for concurrent writers alongside aggregation reads.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_signal_events_table(&pool).await?;

    Ok(pool)
}

/// Create the append-only event table (idempotent)
async fn create_signal_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signal_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            session_number INTEGER NOT NULL CHECK (session_number >= 1),
            kind TEXT NOT NULL CHECK (kind IN ('stuck', 'got_it', 'pause', 'example')),
            confidence INTEGER NOT NULL CHECK (confidence BETWEEN 1 AND 10),
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_signal_events_key \
         ON signal_events(class_id, session_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
