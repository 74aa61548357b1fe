// crates/db/src/lib.rs
//! SQLite persistence for sessionlens.
//!
//! One `Database` handle owns everything durable: the session rows, the
//! per-tool call counts, the FTS5 content index, and the file-tracking table
//! that drives incremental indexing. Exactly one indexer writes at a time;
//! concurrent readers are safe under WAL.

mod migrations;
mod queries;
pub mod indexer;

pub use queries::{
    sanitize_match_query, IndexSummary, ListOptions, ResolveOutcome, SearchHit, ToolStat,
    MATCH_ALL,
};

use sessionlens_core::ParseError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Failed to determine home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("full-text index unavailable")]
    FtsUnavailable,
}

pub type DbResult<T> = Result<T, DbError>;

/// Main database handle wrapping a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    db_path: PathBuf,
    /// False when the FTS5 virtual table could not be created (e.g. the
    /// module is missing from the linked SQLite). Content search degrades to
    /// unranked listing; everything else keeps working.
    fts_enabled: bool,
}

impl Database {
    /// Open (or create) the database at the given path and run migrations.
    ///
    /// Core schema failures are fatal; optional migrations (subagent
    /// columns, FTS table, back-fill) are logged and skipped on error.
    pub async fn new(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30))
            // 64 MB page cache
            .pragma("cache_size", "-65536")
            .log_slow_statements(
                tracing::log::LevelFilter::Warn,
                std::time::Duration::from_secs(5),
            );

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let mut db = Self {
            pool,
            db_path: path.to_owned(),
            fts_enabled: false,
        };
        db.run_migrations().await?;

        info!("database opened at {}", path.display());
        Ok(db)
    }

    /// Create an in-memory database (for testing). A single pooled
    /// connection, because every `:memory:` connection is its own database.
    pub async fn new_in_memory() -> DbResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(sqlx::Error::from)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let mut db = Self {
            pool,
            db_path: PathBuf::new(),
            fts_enabled: false,
        };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open the database at the default location
    /// (`<claude_home>/data/conversations.db`, env-overridable).
    pub async fn open_default() -> DbResult<Self> {
        let path = sessionlens_core::default_db_path().ok_or(DbError::NoHomeDir)?;
        Self::new(&path).await
    }

    /// Run versioned core migrations, then the tolerant optional ones.
    async fn run_migrations(&mut self) -> DbResult<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS _migrations (version INTEGER PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        let row: (i64,) = sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;
        let current_version = row.0 as usize;

        for (i, migration) in migrations::MIGRATIONS.iter().enumerate() {
            let version = i + 1; // 1-based
            if version > current_version {
                sqlx::query(migration).execute(&self.pool).await?;
                sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
                    .bind(version as i64)
                    .execute(&self.pool)
                    .await?;
            }
        }

        self.fts_enabled = migrations::apply_optional_migrations(&self.pool).await;
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the database file; empty for in-memory databases.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the FTS5 index is available. When false, search callers fall
    /// back to unranked listing.
    pub fn fts_enabled(&self) -> bool {
        self.fts_enabled
    }

    /// Reclaim free pages in the database file.
    pub async fn vacuum(&self) -> DbResult<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool, flushing WAL state.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
