//! SQLite pool shared by the ingestion and query paths.
//!
//! One file on disk holds the whole knowledge base: documents, chunks,
//! vectors, FAQ entries, and the fallback log. WAL journaling lets routed
//! queries keep reading while an archive ingest is writing.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;

use crate::migrate;

/// Open the database at `db_path`, creating the file and any missing parent
/// directories, and bring the schema up to date. Migrations are idempotent,
/// so every command goes through here.
pub async fn open(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;

    migrate::run_migrations(&pool).await?;
    Ok(pool)
}
