// crates/db/src/queries/stats.rs
// Aggregate statistics over the indexed corpus.

use crate::{Database, DbResult};
use chrono::Utc;
use serde::Serialize;

/// Per-tool aggregate across all sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStat {
    pub tool_name: String,
    pub total_calls: i64,
    /// Number of distinct sessions that used the tool at least once.
    pub session_count: i64,
}

/// Corpus-wide totals plus recent activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_tokens: i64,
    pub total_bytes: i64,
    pub project_count: i64,
    /// Sessions whose `last_modified` falls within the trailing 24 hours.
    pub active_last_24h: i64,
}

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

impl Database {
    /// Per-tool call totals, most-used first.
    pub async fn tool_stats(&self) -> DbResult<Vec<ToolStat>> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT tool_name, SUM(call_count) AS total_calls, COUNT(DISTINCT session_id) \
             FROM tool_usage GROUP BY tool_name ORDER BY total_calls DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(tool_name, total_calls, session_count)| ToolStat {
                tool_name,
                total_calls,
                session_count,
            })
            .collect())
    }

    /// Totals across the whole index.
    pub async fn summary(&self) -> DbResult<IndexSummary> {
        let (total_sessions, total_messages, total_tokens, total_bytes, project_count): (
            i64,
            i64,
            i64,
            i64,
            i64,
        ) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(message_count), 0), \
                    COALESCE(SUM(tokens_total), 0), \
                    COALESCE(SUM(file_size), 0), \
                    COUNT(DISTINCT project) \
             FROM sessions",
        )
        .fetch_one(self.pool())
        .await?;

        let cutoff = Utc::now().timestamp_millis() - DAY_MS;
        let (active_last_24h,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE last_modified >= ?1")
                .bind(cutoff)
                .fetch_one(self.pool())
                .await?;

        Ok(IndexSummary {
            total_sessions,
            total_messages,
            total_tokens,
            total_bytes,
            project_count,
            active_last_24h,
        })
    }
}
