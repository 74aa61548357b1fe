//! Read paths over the sessionlens store: paged listing and ranked
//! full-text search with snippets.
//!
//! Search degrades gracefully: when the FTS layer errors (missing module,
//! corrupted index) the same request is answered from the unranked listing.
//! Callers can tell the two apart by the presence of `relevance`/`snippet`
//! on the results.

pub mod hierarchy;

pub use hierarchy::{group_hierarchy, GroupedSession};

use serde::Serialize;
use sessionlens_core::SessionRecord;
use sessionlens_db::{sanitize_match_query, Database, DbError, ListOptions, MATCH_ALL};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("store error: {0}")]
    Db(#[from] DbError),
}

/// Paging and filtering for both read paths.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: i64,
    pub offset: i64,
    pub project: Option<String>,
    pub include_subagents: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            project: None,
            include_subagents: false,
        }
    }
}

/// One search result. `relevance` and `snippet` are absent on the unranked
/// fallback path (and on wildcard queries).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub session: SessionRecord,
    pub relevance: Option<f64>,
    pub snippet: Option<String>,
    /// The caller's original query, before sanitization.
    pub search_term: String,
}

/// Paged listing, straight from the store.
pub async fn list(db: &Database, opts: &SearchOptions) -> Result<Vec<SessionRecord>, SearchError> {
    Ok(db.list_sessions(&list_options(opts)).await?)
}

/// Ranked full-text search with snippets.
///
/// An empty or whitespace-only query returns no results. A query that
/// sanitizes to nothing (operators and punctuation only) matches everything
/// and is answered from the listing path, unranked. FTS errors fall back the
/// same way.
pub async fn search(
    db: &Database,
    raw_query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    if raw_query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let match_query = sanitize_match_query(raw_query);
    if match_query == MATCH_ALL {
        return unranked(db, raw_query, opts).await;
    }

    match db
        .search_content(
            &match_query,
            opts.limit,
            opts.offset,
            opts.project.as_deref(),
            opts.include_subagents,
        )
        .await
    {
        Ok(hits) => Ok(hits
            .into_iter()
            .map(|hit| SearchResult {
                session: hit.session,
                relevance: Some(hit.relevance),
                snippet: Some(hit.snippet),
                search_term: raw_query.to_string(),
            })
            .collect()),
        Err(e) => {
            warn!("content search failed, falling back to unranked listing: {e}");
            unranked(db, raw_query, opts).await
        }
    }
}

async fn unranked(
    db: &Database,
    raw_query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchResult>, SearchError> {
    let sessions = db.list_sessions(&list_options(opts)).await?;
    Ok(sessions
        .into_iter()
        .map(|session| SearchResult {
            session,
            relevance: None,
            snippet: None,
            search_term: raw_query.to_string(),
        })
        .collect())
}

fn list_options(opts: &SearchOptions) -> ListOptions {
    ListOptions {
        limit: opts.limit,
        offset: opts.offset,
        project: opts.project.clone(),
        include_subagents: opts.include_subagents,
        ..Default::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    pub(crate) fn record(id: &str, last_modified: i64) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            file_path: format!("/p/-proj/{id}.jsonl"),
            filename: format!("{id}.jsonl"),
            project: "proj".to_string(),
            cwd: None,
            message_count: 2,
            file_size: 64,
            last_modified,
            created: last_modified,
            indexed_at: last_modified,
            tokens_total: 0,
            tokens_input: 0,
            tokens_output: 0,
            primary_model: None,
            is_subagent: false,
            parent_id: None,
        }
    }

    async fn seeded_db() -> Database {
        let db = Database::new_in_memory().await.unwrap();
        db.upsert_session(
            &record("auth", 300),
            &HashMap::new(),
            "implement jwt authentication for the login endpoint",
        )
        .await
        .unwrap();
        db.upsert_session(
            &record("pool", 200),
            &HashMap::new(),
            "fix the database connection pooling issue",
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty() {
        let db = seeded_db().await;
        assert!(search(&db, "", &SearchOptions::default()).await.unwrap().is_empty());
        assert!(search(&db, "   ", &SearchOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_operator_only_query_matches_everything_unranked() {
        let db = seeded_db().await;
        let results = search(&db, "AND OR (*)", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.relevance.is_none()));
        assert!(results.iter().all(|r| r.snippet.is_none()));
    }

    #[tokio::test]
    async fn test_wildcard_respects_limit() {
        let db = seeded_db().await;
        let results = search(
            &db,
            "***",
            &SearchOptions {
                limit: 1,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_returns_snippets_and_original_term() {
        let db = seeded_db().await;
        let results = search(&db, "authentication", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].session.id, "auth");
        assert_eq!(results[0].search_term, "authentication");
        let snippet = results[0].snippet.as_deref().expect("ranked result");
        assert!(snippet.contains("{{MATCH}}authentication{{/MATCH}}"));
        assert!(results[0].relevance.is_some());
    }

    #[tokio::test]
    async fn test_search_sanitizes_hostile_input() {
        let db = seeded_db().await;
        let results = search(&db, "login:authentication^", &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].session.id, "auth");
    }

    #[tokio::test]
    async fn test_list_delegates_to_store() {
        let db = seeded_db().await;
        let sessions = list(&db, &SearchOptions::default()).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "auth"); // last_modified desc
    }
}
