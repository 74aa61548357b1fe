// crates/db/src/queries/sessions.rs
// Session CRUD: upsert, removal, listing, and file-tracking state.

use super::row_types::{SessionRow, SESSION_COLUMNS};
use crate::{Database, DbResult};
use sessionlens_core::SessionRecord;
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};

/// Paging, ordering, and filtering for session listings.
///
/// `sort_by` and `order` are free-form on purpose: unknown values silently
/// normalize to `last_modified` / `DESC` so external callers can never
/// inject identifiers into the generated SQL.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub project: Option<String>,
    pub include_subagents: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            sort_by: None,
            order: None,
            project: None,
            include_subagents: false,
        }
    }
}

fn sort_column(requested: Option<&str>) -> &'static str {
    match requested {
        Some("created") => "created",
        Some("tokens_total") => "tokens_total",
        Some("message_count") => "message_count",
        Some("file_size") => "file_size",
        _ => "last_modified",
    }
}

fn sort_order(requested: Option<&str>) -> &'static str {
    match requested {
        Some(o) if o.eq_ignore_ascii_case("asc") => "ASC",
        _ => "DESC",
    }
}

impl Database {
    /// True iff the file has no tracking row or its `(mtime, size)` tuple
    /// differs from the tracked one.
    pub async fn needs_indexing(&self, path: &str, mtime: i64, size: i64) -> DbResult<bool> {
        let row: Option<(i64, i64)> =
            sqlx::query_as("SELECT mtime, size FROM indexed_files WHERE file_path = ?1")
                .bind(path)
                .fetch_optional(self.pool())
                .await?;

        Ok(match row {
            None => true,
            Some((tracked_mtime, tracked_size)) => tracked_mtime != mtime || tracked_size != size,
        })
    }

    /// Atomically replace a session and everything derived from its file.
    ///
    /// Prior FTS and tool rows for the id are deleted, fresh ones inserted,
    /// and the session and file-tracking rows upserted, all in one
    /// transaction. Whitespace-only searchable text yields no FTS row (but
    /// any prior one is still removed).
    pub async fn upsert_session(
        &self,
        record: &SessionRecord,
        tools: &HashMap<String, i64>,
        searchable_text: &str,
    ) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        if self.fts_enabled {
            sqlx::query("DELETE FROM sessions_fts WHERE session_id = ?1")
                .bind(&record.id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM tool_usage WHERE session_id = ?1")
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, file_path, filename, project, cwd,
                message_count, file_size, last_modified, created, indexed_at,
                tokens_total, tokens_input, tokens_output, primary_model,
                is_subagent, parent_id
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16
            )
            ON CONFLICT(id) DO UPDATE SET
                file_path = excluded.file_path,
                filename = excluded.filename,
                project = excluded.project,
                cwd = excluded.cwd,
                message_count = excluded.message_count,
                file_size = excluded.file_size,
                last_modified = excluded.last_modified,
                created = excluded.created,
                indexed_at = excluded.indexed_at,
                tokens_total = excluded.tokens_total,
                tokens_input = excluded.tokens_input,
                tokens_output = excluded.tokens_output,
                primary_model = excluded.primary_model,
                is_subagent = excluded.is_subagent,
                parent_id = excluded.parent_id
            "#,
        )
        .bind(&record.id)
        .bind(&record.file_path)
        .bind(&record.filename)
        .bind(&record.project)
        .bind(&record.cwd)
        .bind(record.message_count)
        .bind(record.file_size)
        .bind(record.last_modified)
        .bind(record.created)
        .bind(record.indexed_at)
        .bind(record.tokens_total)
        .bind(record.tokens_input)
        .bind(record.tokens_output)
        .bind(&record.primary_model)
        .bind(record.is_subagent)
        .bind(&record.parent_id)
        .execute(&mut *tx)
        .await?;

        for (tool_name, call_count) in tools {
            sqlx::query(
                "INSERT INTO tool_usage (session_id, tool_name, call_count) VALUES (?1, ?2, ?3)",
            )
            .bind(&record.id)
            .bind(tool_name)
            .bind(call_count)
            .execute(&mut *tx)
            .await?;
        }

        if self.fts_enabled && !searchable_text.trim().is_empty() {
            sqlx::query("INSERT INTO sessions_fts (session_id, content, project) VALUES (?1, ?2, ?3)")
                .bind(&record.id)
                .bind(searchable_text)
                .bind(&record.project)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO indexed_files (file_path, mtime, size, indexed_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.file_path)
        .bind(record.last_modified)
        .bind(record.file_size)
        .bind(record.indexed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a session and its FTS/tool rows. File tracking is untouched.
    pub async fn remove_session(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;
        self.delete_session_rows(&mut tx, id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Handle a file disappearing from the source tree.
    ///
    /// In one transaction: children pointing at the removed session get
    /// `parent_id` cleared (they are not deleted), the session and its
    /// derived rows go away, and the file-tracking row is dropped.
    pub async fn remove_file(&self, path: &str) -> DbResult<()> {
        let mut tx = self.pool().begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM sessions WHERE file_path = ?1")
                .bind(path)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some((id,)) = existing {
            sqlx::query("UPDATE sessions SET parent_id = NULL WHERE parent_id = ?1")
                .bind(&id)
                .execute(&mut *tx)
                .await?;
            self.delete_session_rows(&mut tx, &id).await?;
        }

        sqlx::query("DELETE FROM indexed_files WHERE file_path = ?1")
            .bind(path)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_session_rows(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: &str,
    ) -> DbResult<()> {
        if self.fts_enabled {
            sqlx::query("DELETE FROM sessions_fts WHERE session_id = ?1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        sqlx::query("DELETE FROM tool_usage WHERE session_id = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Paged session retrieval. Subagents are excluded unless requested.
    pub async fn list_sessions(&self, opts: &ListOptions) -> DbResult<Vec<SessionRecord>> {
        let sort = sort_column(opts.sort_by.as_deref());
        let order = sort_order(opts.order.as_deref());

        let mut sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE 1=1");
        if !opts.include_subagents {
            sql.push_str(" AND (s.is_subagent = 0 OR s.is_subagent IS NULL)");
        }
        if opts.project.is_some() {
            sql.push_str(" AND s.project = ?");
        }
        sql.push_str(&format!(" ORDER BY s.{sort} {order} LIMIT ? OFFSET ?"));

        let mut query = sqlx::query(&sql);
        if let Some(project) = &opts.project {
            query = query.bind(project);
        }
        query = query.bind(opts.limit).bind(opts.offset);

        let rows = query.fetch_all(self.pool()).await?;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in &rows {
            sessions.push(SessionRow::from_row(row)?.0);
        }
        Ok(sessions)
    }

    pub async fn get_session(&self, id: &str) -> DbResult<Option<SessionRecord>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(match row {
            Some(row) => Some(SessionRow::from_row(&row)?.0),
            None => None,
        })
    }

    pub async fn count_sessions(&self, project: Option<&str>) -> DbResult<i64> {
        let count: (i64,) = match project {
            Some(project) => {
                sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE project = ?1")
                    .bind(project)
                    .fetch_one(self.pool())
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM sessions")
                    .fetch_one(self.pool())
                    .await?
            }
        };
        Ok(count.0)
    }

    /// Sorted distinct non-empty project names.
    pub async fn list_projects(&self) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT project FROM sessions \
             WHERE project IS NOT NULL AND project <> '' ORDER BY project",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }

    /// Every file path with a tracking row. The indexer diffs this against
    /// the walk to find deletions.
    pub async fn indexed_paths(&self) -> DbResult<HashSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT file_path FROM indexed_files")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(p,)| p).collect())
    }
}
