// crates/search/src/hierarchy.rs
//! Parent/subagent grouping of heterogeneous result sets.
//!
//! When subagents are included in a listing or search, results are regrouped
//! so each parent is immediately followed by its subagents. A subagent whose
//! parent did not itself match is still shown under it: the parent record is
//! fetched from the store as a display-only stub.

use crate::SearchError;
use serde::Serialize;
use sessionlens_core::SessionRecord;
use sessionlens_db::Database;
use std::collections::{HashMap, HashSet};

/// One entry of a grouped result list.
#[derive(Debug, Clone, Serialize)]
pub struct GroupedSession {
    pub session: SessionRecord,
    /// True when the parent was fetched only so its subagents have a home.
    pub is_stub: bool,
    /// For parents: how many subagents from the input set sit under them.
    pub subagent_count: u64,
}

/// Group a mixed set of parents and subagents into display order.
///
/// Parents (real, then stubs for matched-but-absent parents) are sorted by
/// `last_modified` descending, each followed by its subagents in the same
/// order; orphan subagents whose parent cannot be fetched trail at the end.
/// Stable: identical inputs produce identical output.
pub async fn group_hierarchy(
    db: &Database,
    results: Vec<SessionRecord>,
) -> Result<Vec<GroupedSession>, SearchError> {
    let mut parents: Vec<SessionRecord> = Vec::new();
    let mut subagents: Vec<SessionRecord> = Vec::new();
    for session in results {
        if session.is_subagent {
            subagents.push(session);
        } else {
            parents.push(session);
        }
    }

    let mut known_parents: HashSet<String> = parents.iter().map(|p| p.id.clone()).collect();

    // Fetch stubs for parents that did not match themselves, preserving
    // first-reference order.
    let mut stubs: Vec<SessionRecord> = Vec::new();
    for subagent in &subagents {
        let Some(parent_id) = &subagent.parent_id else {
            continue;
        };
        if known_parents.contains(parent_id) {
            continue;
        }
        if let Some(parent) = db.get_session(parent_id).await? {
            known_parents.insert(parent.id.clone());
            stubs.push(parent);
        }
    }

    let mut counts: HashMap<String, u64> = HashMap::new();
    for subagent in &subagents {
        if let Some(parent_id) = &subagent.parent_id {
            *counts.entry(parent_id.clone()).or_insert(0) += 1;
        }
    }

    let stub_ids: HashSet<String> = stubs.iter().map(|s| s.id.clone()).collect();
    let mut ordered: Vec<SessionRecord> = parents;
    ordered.extend(stubs);
    ordered.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));

    let mut children: HashMap<String, Vec<SessionRecord>> = HashMap::new();
    let mut orphans: Vec<SessionRecord> = Vec::new();
    for subagent in subagents {
        match &subagent.parent_id {
            Some(parent_id) if known_parents.contains(parent_id) => {
                children
                    .entry(parent_id.clone())
                    .or_default()
                    .push(subagent);
            }
            _ => orphans.push(subagent),
        }
    }

    let mut grouped = Vec::new();
    for parent in ordered {
        let count = counts.get(parent.id.as_str()).copied().unwrap_or(0);
        let is_stub = stub_ids.contains(&parent.id);
        let id = parent.id.clone();
        grouped.push(GroupedSession {
            session: parent,
            is_stub,
            subagent_count: count,
        });
        if let Some(mut kids) = children.remove(&id) {
            kids.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
            grouped.extend(kids.into_iter().map(|session| GroupedSession {
                session,
                is_stub: false,
                subagent_count: 0,
            }));
        }
    }

    grouped.extend(orphans.into_iter().map(|session| GroupedSession {
        session,
        is_stub: false,
        subagent_count: 0,
    }));

    Ok(grouped)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn parent(id: &str, last_modified: i64) -> SessionRecord {
        crate::tests::record(id, last_modified)
    }

    fn subagent(id: &str, parent_id: &str, last_modified: i64) -> SessionRecord {
        let mut record = crate::tests::record(id, last_modified);
        record.file_path = format!("/p/-proj/{parent_id}/subagents/{id}.jsonl");
        record.is_subagent = true;
        record.parent_id = Some(parent_id.to_string());
        record
    }

    #[tokio::test]
    async fn test_parents_followed_by_their_subagents() {
        let db = Database::new_in_memory().await.unwrap();

        let input = vec![
            subagent("p1_a", "p1", 50),
            parent("p2", 200),
            parent("p1", 100),
            subagent("p1_b", "p1", 75),
            subagent("p2_a", "p2", 10),
        ];

        let grouped = group_hierarchy(&db, input).await.unwrap();
        let ids: Vec<&str> = grouped.iter().map(|g| g.session.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p2_a", "p1", "p1_b", "p1_a"]);

        assert_eq!(grouped[0].subagent_count, 1);
        assert_eq!(grouped[2].subagent_count, 2);
        assert!(grouped.iter().all(|g| !g.is_stub));
    }

    #[tokio::test]
    async fn test_stub_parent_fetched_from_store() {
        let db = Database::new_in_memory().await.unwrap();
        let stored = parent("stored-parent", 500);
        db.upsert_session(&stored, &StdHashMap::new(), "parent text")
            .await
            .unwrap();

        let input = vec![subagent("stored-parent_a", "stored-parent", 100)];
        let grouped = group_hierarchy(&db, input).await.unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].session.id, "stored-parent");
        assert!(grouped[0].is_stub);
        assert_eq!(grouped[0].subagent_count, 1);
        assert_eq!(grouped[1].session.id, "stored-parent_a");
    }

    #[tokio::test]
    async fn test_orphans_appended_at_end() {
        let db = Database::new_in_memory().await.unwrap();

        let input = vec![
            subagent("ghost_a", "ghost", 900), // parent not in store
            parent("real", 100),
        ];
        let grouped = group_hierarchy(&db, input).await.unwrap();
        let ids: Vec<&str> = grouped.iter().map(|g| g.session.id.as_str()).collect();
        assert_eq!(ids, vec!["real", "ghost_a"]);
    }

    #[tokio::test]
    async fn test_grouping_is_deterministic() {
        let db = Database::new_in_memory().await.unwrap();
        let input = vec![
            parent("p1", 100),
            subagent("p1_a", "p1", 100),
            subagent("p1_b", "p1", 100),
        ];

        let once = group_hierarchy(&db, input.clone()).await.unwrap();
        let twice = group_hierarchy(&db, input).await.unwrap();
        let ids = |g: &[GroupedSession]| {
            g.iter().map(|x| x.session.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&once), ids(&twice));
        // Equal timestamps preserve input order.
        assert_eq!(ids(&once), vec!["p1", "p1_a", "p1_b"]);
    }
}
