// crates/db/src/migrations.rs
//! Inline SQL migrations.
//!
//! `MIGRATIONS` is the versioned core schema; a failure there is fatal at
//! startup. `apply_optional_migrations` runs afterwards on every open: it
//! introspects the live schema, adds the subagent/cwd columns and the FTS5
//! table if absent, and back-fills subagent rows. Each optional step logs
//! and continues on error so an older SQLite build degrades instead of
//! refusing to start.

use sessionlens_core::classify_session_path;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::warn;

pub const MIGRATIONS: &[&str] = &[
    // Migration 1: sessions table
    r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    file_path TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL,
    project TEXT NOT NULL DEFAULT 'Unknown',
    message_count INTEGER NOT NULL DEFAULT 0,
    file_size INTEGER NOT NULL DEFAULT 0,
    last_modified INTEGER NOT NULL DEFAULT 0,
    created INTEGER NOT NULL DEFAULT 0,
    indexed_at INTEGER NOT NULL DEFAULT 0,
    tokens_total INTEGER NOT NULL DEFAULT 0,
    tokens_input INTEGER NOT NULL DEFAULT 0,
    tokens_output INTEGER NOT NULL DEFAULT 0,
    primary_model TEXT
);
"#,
    // Migration 2: sessions indexes
    r#"
CREATE INDEX IF NOT EXISTS idx_sessions_last_modified ON sessions(last_modified DESC);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_sessions_tokens ON sessions(tokens_total DESC);
"#,
    // Migration 3: per-tool call counts, rebuilt atomically with a session
    r#"
CREATE TABLE IF NOT EXISTS tool_usage (
    session_id TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    call_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (session_id, tool_name)
);
"#,
    r#"
CREATE INDEX IF NOT EXISTS idx_tool_usage_name ON tool_usage(tool_name);
"#,
    // Migration 4: file tracking for incremental skip
    r#"
CREATE TABLE IF NOT EXISTS indexed_files (
    file_path TEXT PRIMARY KEY,
    mtime INTEGER NOT NULL,
    size INTEGER NOT NULL,
    indexed_at INTEGER NOT NULL
);
"#,
];

/// Forward-only, tolerant migrations. Returns whether the FTS5 table is
/// usable.
pub async fn apply_optional_migrations(pool: &SqlitePool) -> bool {
    add_missing_session_columns(pool).await;

    for sql in [
        "CREATE INDEX IF NOT EXISTS idx_sessions_parent ON sessions(parent_id)",
        "CREATE INDEX IF NOT EXISTS idx_sessions_subagent ON sessions(is_subagent)",
    ] {
        if let Err(e) = sqlx::query(sql).execute(pool).await {
            warn!("optional index migration failed: {e}");
        }
    }

    let fts_enabled = match sqlx::query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS sessions_fts USING fts5(\
            session_id UNINDEXED,\
            content,\
            project,\
            tokenize = 'unicode61 remove_diacritics 2'\
        )",
    )
    .execute(pool)
    .await
    {
        Ok(_) => true,
        Err(e) => {
            warn!("FTS5 index unavailable, search will fall back to listing: {e}");
            false
        }
    };

    if let Err(e) = backfill_subagent_rows(pool).await {
        warn!("subagent back-fill failed: {e}");
    }

    fts_enabled
}

/// Add `is_subagent`, `parent_id`, and `cwd` to `sessions` if absent.
async fn add_missing_session_columns(pool: &SqlitePool) {
    let existing: Vec<String> =
        match sqlx::query_as::<_, (String,)>("SELECT name FROM pragma_table_info('sessions')")
            .fetch_all(pool)
            .await
        {
            Ok(rows) => rows.into_iter().map(|(name,)| name).collect(),
            Err(e) => {
                warn!("schema introspection failed, skipping column migrations: {e}");
                return;
            }
        };

    let wanted = [
        (
            "is_subagent",
            "ALTER TABLE sessions ADD COLUMN is_subagent INTEGER NOT NULL DEFAULT 0",
        ),
        ("parent_id", "ALTER TABLE sessions ADD COLUMN parent_id TEXT"),
        ("cwd", "ALTER TABLE sessions ADD COLUMN cwd TEXT"),
    ];

    for (column, sql) in wanted {
        if existing.iter().any(|name| name == column) {
            continue;
        }
        if let Err(e) = sqlx::query(sql).execute(pool).await {
            warn!("adding column {column} failed: {e}");
        }
    }
}

/// Mark pre-existing rows whose file path contains a `subagents` segment.
async fn backfill_subagent_rows(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT id, file_path FROM sessions \
         WHERE (is_subagent = 0 OR is_subagent IS NULL) AND file_path LIKE '%subagents%'",
    )
    .fetch_all(pool)
    .await?;

    for (id, file_path) in rows {
        let info = classify_session_path(Path::new(&file_path));
        if !info.is_subagent {
            continue;
        }
        sqlx::query("UPDATE sessions SET is_subagent = 1, parent_id = ?1 WHERE id = ?2")
            .bind(&info.parent_id)
            .bind(&id)
            .execute(pool)
            .await?;
    }
    Ok(())
}
