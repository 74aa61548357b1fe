// crates/core/src/subagent.rs
//! Subagent classification from file paths.
//!
//! Whether a session is a subagent is a pure function of where its log file
//! lives: `<project-dir>/<parent-id>/subagents/<agent>.jsonl`. File contents
//! are never consulted.

use regex_lite::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::warn;

/// Result of classifying a session log path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubagentInfo {
    pub is_subagent: bool,
    /// The path segment immediately before `subagents`.
    pub parent_id: Option<String>,
}

fn uuidish() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^[a-f0-9-]{8,}$").unwrap())
}

/// Classify a session log path as top-level or subagent.
///
/// A path is a subagent iff some segment equals `subagents` and is not the
/// first segment; the parent id is the segment immediately preceding it.
/// A parent segment that does not look like a UUID gets a warning but is
/// still used.
pub fn classify_session_path(path: &Path) -> SubagentInfo {
    let segments: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();

    for (i, segment) in segments.iter().enumerate() {
        if segment == "subagents" && i > 0 {
            let parent = segments[i - 1].clone();
            if !uuidish().is_match(&parent) {
                warn!(
                    "subagent parent segment {:?} in {} does not look like a session id",
                    parent,
                    path.display()
                );
            }
            return SubagentInfo {
                is_subagent: true,
                parent_id: Some(parent),
            };
        }
    }

    SubagentInfo::default()
}

/// Derive the session id for a log path: the filename stem, prefixed with
/// `"<parent_id>_"` for subagents so identical agent filenames under
/// different parents stay distinct.
pub fn session_id_for(path: &Path, info: &SubagentInfo) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    match (&info.is_subagent, &info.parent_id) {
        (true, Some(parent)) => format!("{parent}_{stem}"),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_top_level_session() {
        let path = PathBuf::from("/root/projects/-Users-u-proj/abc123.jsonl");
        let info = classify_session_path(&path);
        assert!(!info.is_subagent);
        assert!(info.parent_id.is_none());
        assert_eq!(session_id_for(&path, &info), "abc123");
    }

    #[test]
    fn test_subagent_session() {
        let path = PathBuf::from(
            "/root/projects/-Users-u-proj/6f1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9/subagents/agent-1.jsonl",
        );
        let info = classify_session_path(&path);
        assert!(info.is_subagent);
        assert_eq!(
            info.parent_id.as_deref(),
            Some("6f1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9")
        );
        assert_eq!(
            session_id_for(&path, &info),
            "6f1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9_agent-1"
        );
    }

    #[test]
    fn test_same_agent_name_under_two_parents() {
        let a = PathBuf::from("/r/p/-proj/parentaaa-1111/subagents/agent-1.jsonl");
        let b = PathBuf::from("/r/p/-proj/parentbbb-2222/subagents/agent-1.jsonl");
        let ia = classify_session_path(&a);
        let ib = classify_session_path(&b);
        let id_a = session_id_for(&a, &ia);
        let id_b = session_id_for(&b, &ib);
        assert_ne!(id_a, id_b);
        assert!(id_a.starts_with("parentaaa-1111_"));
        assert!(id_b.starts_with("parentbbb-2222_"));
    }

    #[test]
    fn test_subagents_as_first_segment_is_not_subagent() {
        let path = PathBuf::from("subagents/agent-1.jsonl");
        let info = classify_session_path(&path);
        assert!(!info.is_subagent);
    }

    #[test]
    fn test_non_uuid_parent_still_classified() {
        let path = PathBuf::from("/r/p/-proj/weird_parent!/subagents/agent-1.jsonl");
        let info = classify_session_path(&path);
        assert!(info.is_subagent);
        assert_eq!(info.parent_id.as_deref(), Some("weird_parent!"));
    }

    #[test]
    fn test_uuidish_pattern() {
        assert!(uuidish().is_match("6f1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9"));
        assert!(uuidish().is_match("ABCDEF1234"));
        assert!(!uuidish().is_match("short"));
        assert!(!uuidish().is_match("not_a_uuid_here"));
    }
}
