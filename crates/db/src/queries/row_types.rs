// crates/db/src/queries/row_types.rs
// Row mapping between SQLite and the core record types.

use sessionlens_core::SessionRecord;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Column list for session selects. Always used with the `s` table alias so
/// the same string works for plain selects and FTS joins.
pub(crate) const SESSION_COLUMNS: &str = "s.id, s.file_path, s.filename, s.project, s.cwd, \
     s.message_count, s.file_size, s.last_modified, s.created, s.indexed_at, \
     s.tokens_total, s.tokens_input, s.tokens_output, s.primary_model, \
     s.is_subagent, s.parent_id";

/// Intermediate row type; `sqlx::FromRow` cannot be implemented for the core
/// crate's `SessionRecord` directly.
#[derive(Debug, Clone)]
pub(crate) struct SessionRow(pub(crate) SessionRecord);

impl<'r> sqlx::FromRow<'r, SqliteRow> for SessionRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self(SessionRecord {
            id: row.try_get("id")?,
            file_path: row.try_get("file_path")?,
            filename: row.try_get("filename")?,
            project: row.try_get("project")?,
            cwd: row.try_get("cwd")?,
            message_count: row.try_get("message_count")?,
            file_size: row.try_get("file_size")?,
            last_modified: row.try_get("last_modified")?,
            created: row.try_get("created")?,
            indexed_at: row.try_get("indexed_at")?,
            tokens_total: row.try_get("tokens_total")?,
            tokens_input: row.try_get("tokens_input")?,
            tokens_output: row.try_get("tokens_output")?,
            primary_model: row.try_get("primary_model")?,
            is_subagent: row.try_get("is_subagent")?,
            parent_id: row.try_get("parent_id")?,
        }))
    }
}
