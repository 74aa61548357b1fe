//! Storage locations and their environment overrides.
//!
//! Single source of truth; keeps ad-hoc `dirs::home_dir().join(...)` out of
//! the other crates.

use std::path::PathBuf;

/// Overrides the root above `projects/` (default `~/.claude`).
pub const CLAUDE_HOME_ENV: &str = "CLAUDE_HOME";

/// Overrides the database file path (default `<claude_home>/data/conversations.db`).
pub const DB_PATH_ENV: &str = "SESSIONLENS_DB";

/// Root of the assistant's on-disk state: `$CLAUDE_HOME` or `~/.claude`.
pub fn claude_home() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os(CLAUDE_HOME_ENV) {
        if !home.is_empty() {
            return Some(PathBuf::from(home));
        }
    }
    dirs::home_dir().map(|h| h.join(".claude"))
}

/// The tree of per-project session logs: `<claude_home>/projects/`.
pub fn projects_dir() -> Option<PathBuf> {
    claude_home().map(|h| h.join("projects"))
}

/// Database file: `$SESSIONLENS_DB` or `<claude_home>/data/conversations.db`.
pub fn default_db_path() -> Option<PathBuf> {
    if let Some(db) = std::env::var_os(DB_PATH_ENV) {
        if !db.is_empty() {
            return Some(PathBuf::from(db));
        }
    }
    claude_home().map(|h| h.join("data").join("conversations.db"))
}
