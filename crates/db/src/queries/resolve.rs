// crates/db/src/queries/resolve.rs
// Canonical project-name resolution across an encoded folder.
//
// The on-disk folder name is a lossy slash-to-dash encoding of a cwd, so
// sessions in the same folder can disagree on `project`: one extracted from
// a subdirectory cwd, one from the repo root, one from the encoded fallback.
// After every full pass the shortest cwd in each folder wins and everyone is
// renamed to its basename.

use crate::{Database, DbResult};
use std::collections::HashMap;
use std::path::{Component, Path};

/// Counts from one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Encoded folders in which at least one session was renamed.
    pub groups_updated: u64,
    /// Sessions whose `project` changed.
    pub sessions_updated: u64,
}

/// First path segment under `root`, i.e. the encoded project folder.
pub(crate) fn encoded_folder(root: &Path, file_path: &Path) -> Option<String> {
    let rel = file_path.strip_prefix(root).ok()?;
    rel.components().find_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().to_string()),
        _ => None,
    })
}

struct GroupMember {
    id: String,
    project: String,
    cwd: Option<String>,
}

impl Database {
    /// Normalize `project` across every encoded folder, in one transaction.
    ///
    /// Within each folder the non-null cwds are sorted by length and the
    /// shortest becomes the candidate root; no prefix verification is
    /// attempted. Folders with no recorded cwd, or whose candidate has an
    /// empty basename, are left alone. FTS rows mirror the rename.
    pub async fn resolve_project_names(&self, projects_root: &Path) -> DbResult<ResolveOutcome> {
        let rows: Vec<(String, String, String, Option<String>)> =
            sqlx::query_as("SELECT id, file_path, project, cwd FROM sessions")
                .fetch_all(self.pool())
                .await?;

        let mut groups: HashMap<String, Vec<GroupMember>> = HashMap::new();
        for (id, file_path, project, cwd) in rows {
            if let Some(folder) = encoded_folder(projects_root, Path::new(&file_path)) {
                groups
                    .entry(folder)
                    .or_default()
                    .push(GroupMember { id, project, cwd });
            }
        }

        let mut outcome = ResolveOutcome::default();
        let mut tx = self.pool().begin().await?;

        for members in groups.values() {
            let mut cwds: Vec<&str> = members.iter().filter_map(|m| m.cwd.as_deref()).collect();
            cwds.sort_unstable();
            cwds.dedup();
            cwds.sort_by_key(|c| c.len());
            let Some(shortest) = cwds.first() else {
                continue;
            };

            let canonical = match Path::new(shortest).file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            if canonical.is_empty() {
                continue;
            }

            let mut changed = 0u64;
            for member in members {
                if member.project == canonical {
                    continue;
                }
                sqlx::query("UPDATE sessions SET project = ?1 WHERE id = ?2")
                    .bind(&canonical)
                    .bind(&member.id)
                    .execute(&mut *tx)
                    .await?;
                if self.fts_enabled {
                    sqlx::query("UPDATE sessions_fts SET project = ?1 WHERE session_id = ?2")
                        .bind(&canonical)
                        .bind(&member.id)
                        .execute(&mut *tx)
                        .await?;
                }
                changed += 1;
            }

            if changed > 0 {
                outcome.groups_updated += 1;
                outcome.sessions_updated += changed;
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionlens_core::SessionRecord;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn record(id: &str, file_path: &str, project: &str, cwd: Option<&str>) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            file_path: file_path.to_string(),
            filename: file_path.rsplit('/').next().unwrap_or_default().to_string(),
            project: project.to_string(),
            cwd: cwd.map(str::to_string),
            message_count: 1,
            file_size: 10,
            last_modified: 1,
            created: 1,
            indexed_at: 1,
            tokens_total: 0,
            tokens_input: 0,
            tokens_output: 0,
            primary_model: None,
            is_subagent: false,
            parent_id: None,
        }
    }

    #[test]
    fn test_encoded_folder_extraction() {
        let root = PathBuf::from("/home/u/.claude/projects");
        assert_eq!(
            encoded_folder(&root, Path::new("/home/u/.claude/projects/-u-proj/a.jsonl")),
            Some("-u-proj".to_string())
        );
        assert_eq!(
            encoded_folder(&root, Path::new("/elsewhere/-u-proj/a.jsonl")),
            None
        );
    }

    #[tokio::test]
    async fn test_resolution_unifies_folder_on_shortest_cwd() {
        let db = crate::Database::new_in_memory().await.unwrap();
        let root = PathBuf::from("/r/projects");

        db.upsert_session(
            &record(
                "a",
                "/r/projects/-u-proj-my-project/a.jsonl",
                "my-project",
                Some("/u/proj/my-project"),
            ),
            &HashMap::new(),
            "alpha text",
        )
        .await
        .unwrap();
        db.upsert_session(
            &record(
                "b",
                "/r/projects/-u-proj-my-project/b.jsonl",
                "src",
                Some("/u/proj/my-project/src"),
            ),
            &HashMap::new(),
            "beta text",
        )
        .await
        .unwrap();

        let outcome = db.resolve_project_names(&root).await.unwrap();
        assert_eq!(outcome.groups_updated, 1);
        assert_eq!(outcome.sessions_updated, 1);

        for id in ["a", "b"] {
            let session = db.get_session(id).await.unwrap().unwrap();
            assert_eq!(session.project, "my-project");
        }

        // The FTS project column follows the rename.
        let (fts_project,): (String,) =
            sqlx::query_as("SELECT project FROM sessions_fts WHERE session_id = 'b'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(fts_project, "my-project");
    }

    #[tokio::test]
    async fn test_resolution_skips_groups_without_cwd() {
        let db = crate::Database::new_in_memory().await.unwrap();
        let root = PathBuf::from("/r/projects");

        db.upsert_session(
            &record("a", "/r/projects/-u-mystery/a.jsonl", "mystery", None),
            &HashMap::new(),
            "t",
        )
        .await
        .unwrap();

        let outcome = db.resolve_project_names(&root).await.unwrap();
        assert_eq!(outcome, ResolveOutcome::default());
        assert_eq!(
            db.get_session("a").await.unwrap().unwrap().project,
            "mystery"
        );
    }

    #[tokio::test]
    async fn test_resolution_idempotent() {
        let db = crate::Database::new_in_memory().await.unwrap();
        let root = PathBuf::from("/r/projects");

        db.upsert_session(
            &record(
                "a",
                "/r/projects/-u-app/a.jsonl",
                "deep",
                Some("/u/app/deep/nested"),
            ),
            &HashMap::new(),
            "t",
        )
        .await
        .unwrap();
        db.upsert_session(
            &record("b", "/r/projects/-u-app/b.jsonl", "app", Some("/u/app")),
            &HashMap::new(),
            "t",
        )
        .await
        .unwrap();

        let first = db.resolve_project_names(&root).await.unwrap();
        assert_eq!(first.sessions_updated, 1);

        let second = db.resolve_project_names(&root).await.unwrap();
        assert_eq!(second, ResolveOutcome::default());
    }
}
