// crates/db/src/queries/fts.rs
// Full-text primitives: query sanitization, ranked matches, snippets.

use super::row_types::{SessionRow, SESSION_COLUMNS};
use crate::{Database, DbError, DbResult};
use sessionlens_core::SessionRecord;
use sqlx::{FromRow, Row};

/// Sentinel produced by [`sanitize_match_query`] when nothing searchable
/// survives sanitization. Callers route it to the unranked listing path
/// instead of handing it to FTS5.
pub const MATCH_ALL: &str = "*";

/// One ranked match from the content index.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub session: SessionRecord,
    /// BM25 rank; lower is more relevant.
    pub relevance: f64,
    /// Snippet with matches wrapped in `{{MATCH}}`…`{{/MATCH}}`.
    pub snippet: String,
}

/// Reduce free text to something FTS5 will always accept.
///
/// Quote, colon, parenthesis, caret, star, minus and plus become spaces;
/// standalone boolean operators are stripped; whitespace collapses. An
/// empty result becomes the [`MATCH_ALL`] sentinel.
pub fn sanitize_match_query(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '"' | ':' | '(' | ')' | '^' | '*' | '-' | '+' => cleaned.push(' '),
            _ => cleaned.push(ch),
        }
    }

    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| {
            !["AND", "OR", "NOT", "NEAR"]
                .iter()
                .any(|op| token.eq_ignore_ascii_case(op))
        })
        .collect();

    let joined = tokens.join(" ");
    if joined.is_empty() {
        MATCH_ALL.to_string()
    } else {
        joined
    }
}

impl Database {
    /// Execute a sanitized match query against the content index.
    ///
    /// Results come back BM25-ascending (most relevant first) with a
    /// `{{MATCH}}`-delimited snippet per hit. Fails with
    /// [`DbError::FtsUnavailable`] when the FTS5 table never came up;
    /// callers degrade to `list_sessions`.
    pub async fn search_content(
        &self,
        match_query: &str,
        limit: i64,
        offset: i64,
        project: Option<&str>,
        include_subagents: bool,
    ) -> DbResult<Vec<SearchHit>> {
        if !self.fts_enabled {
            return Err(DbError::FtsUnavailable);
        }

        let mut sql = String::from("SELECT ");
        sql.push_str(SESSION_COLUMNS);
        sql.push_str(
            ", bm25(sessions_fts) AS relevance, \
             snippet(sessions_fts, 1, '{{MATCH}}', '{{/MATCH}}', '...', 20) AS snippet \
             FROM sessions_fts \
             JOIN sessions s ON s.id = sessions_fts.session_id \
             WHERE sessions_fts MATCH ?",
        );
        if project.is_some() {
            sql.push_str(" AND sessions_fts.project = ?");
        }
        if !include_subagents {
            sql.push_str(" AND (s.is_subagent = 0 OR s.is_subagent IS NULL)");
        }
        sql.push_str(" ORDER BY relevance ASC LIMIT ? OFFSET ?");

        let mut query = sqlx::query(&sql).bind(match_query);
        if let Some(project) = project {
            query = query.bind(project);
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(self.pool()).await?;
        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            hits.push(SearchHit {
                session: SessionRow::from_row(row)?.0,
                relevance: row.try_get("relevance")?,
                snippet: row.try_get("snippet")?,
            });
        }
        Ok(hits)
    }
}
