// crates/db/src/indexer.rs
//! Indexing pipeline: walk → diff → parse → upsert → reconcile → resolve.
//!
//! A full pass discovers every `.jsonl` under the projects root, re-parses
//! only files whose `(mtime, size)` changed, removes sessions whose files
//! disappeared, and finishes with project identity resolution. One file's
//! problems never abort the pass.

use crate::queries::encoded_folder;
use crate::{Database, DbResult};
use chrono::Utc;
use sessionlens_core::{classify_session_path, parse_session_file, session_id_for, SessionRecord};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, warn};

/// Progress callbacks fire every this many files, and once at the end.
pub const PROGRESS_BATCH: usize = 50;

/// Counters for one full indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub scanned: u64,
    pub indexed: u64,
    pub skipped: u64,
    pub removed: u64,
    pub errors: u64,
    pub project_names_resolved: u64,
}

/// Run a full indexing pass over `projects_root`.
///
/// `cancel` is observed between file iterations: a set flag aborts cleanly
/// with everything already indexed left durable. `on_progress` receives
/// `(processed, total)` in batches of [`PROGRESS_BATCH`].
pub async fn index_all<F>(
    db: &Database,
    projects_root: &Path,
    cancel: Option<&AtomicBool>,
    mut on_progress: F,
) -> DbResult<IndexStats>
where
    F: FnMut(usize, usize),
{
    let files = collect_session_files(projects_root).await;
    let total = files.len();
    let mut stats = IndexStats {
        scanned: total as u64,
        ..Default::default()
    };

    let mut tracked = db.indexed_paths().await?;

    for (i, path) in files.iter().enumerate() {
        if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
            debug!("indexing cancelled after {} of {} files", i, total);
            return Ok(stats);
        }

        tracked.remove(path.to_string_lossy().as_ref());

        match index_file(db, projects_root, path).await {
            Ok(true) => stats.indexed += 1,
            Ok(false) => stats.skipped += 1,
            Err(e) => {
                warn!("failed to index {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }

        if (i + 1) % PROGRESS_BATCH == 0 {
            on_progress(i + 1, total);
        }
    }
    on_progress(total, total);

    // Whatever is still tracked no longer exists on disk.
    for path in &tracked {
        match db.remove_file(path).await {
            Ok(()) => stats.removed += 1,
            Err(e) => {
                warn!("failed to remove deleted file {path}: {e}");
                stats.errors += 1;
            }
        }
    }

    match db.resolve_project_names(projects_root).await {
        Ok(outcome) => stats.project_names_resolved = outcome.sessions_updated,
        Err(e) => warn!("project name resolution failed: {e}"),
    }

    Ok(stats)
}

/// Re-run the per-file pipeline for a single path (watcher entry point).
/// Unchanged files are a successful no-op.
pub async fn index_single_file(db: &Database, projects_root: &Path, path: &Path) -> DbResult<()> {
    index_file(db, projects_root, path).await.map(|_| ())
}

/// Index one file. Returns false when the tracked `(mtime, size)` tuple is
/// current and the file was skipped.
async fn index_file(db: &Database, projects_root: &Path, path: &Path) -> DbResult<bool> {
    let meta = fs::metadata(path).await?;
    let mtime = system_time_ms(meta.modified().ok());
    // Creation time is not available on every platform; fall back to mtime.
    let created = system_time_ms(meta.created().ok().or_else(|| meta.modified().ok()));
    let size = meta.len() as i64;
    let path_str = path.to_string_lossy().to_string();

    if !db.needs_indexing(&path_str, mtime, size).await? {
        return Ok(false);
    }

    let info = classify_session_path(path);
    let id = session_id_for(path, &info);
    let parsed = parse_session_file(path).await?;
    let project = determine_project(parsed.cwd.as_deref(), projects_root, path);

    let record = SessionRecord {
        id,
        file_path: path_str,
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        project,
        cwd: parsed.cwd.clone(),
        message_count: parsed.message_count,
        file_size: size,
        last_modified: mtime,
        created,
        indexed_at: Utc::now().timestamp_millis(),
        tokens_total: parsed.token_usage.total,
        tokens_input: parsed.token_usage.input,
        tokens_output: parsed.token_usage.output,
        primary_model: parsed.model_info.primary.clone(),
        is_subagent: info.is_subagent,
        parent_id: info.parent_id,
    };

    db.upsert_session(&record, &parsed.tool_usage.per_name, &parsed.searchable_text)
        .await?;
    Ok(true)
}

/// Recursively collect every `.jsonl` file under `root`. Unreadable entries
/// are logged and skipped; they never abort the walk.
async fn collect_session_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("cannot read {}: {}", dir.display(), e);
                continue;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    match entry.file_type().await {
                        Ok(ft) if ft.is_dir() => pending.push(path),
                        Ok(ft) if ft.is_file() => {
                            if path.extension().map(|e| e == "jsonl").unwrap_or(false) {
                                files.push(path);
                            }
                        }
                        Ok(_) => {}
                        Err(e) => debug!("cannot stat {}: {}", path.display(), e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("error walking {}: {}", dir.display(), e);
                    break;
                }
            }
        }
    }

    files
}

/// Pick a project name: basename of the recorded cwd, else the encoded
/// folder with one leading dash stripped, else "Unknown".
fn determine_project(cwd: Option<&str>, projects_root: &Path, path: &Path) -> String {
    if let Some(cwd) = cwd {
        if let Some(name) = Path::new(cwd).file_name() {
            let name = name.to_string_lossy();
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    if let Some(folder) = encoded_folder(projects_root, path) {
        let stripped = folder.strip_prefix('-').unwrap_or(&folder);
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }

    "Unknown".to_string()
}

fn system_time_ms(time: Option<SystemTime>) -> i64 {
    time.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

// ============================================================================
// Tests
// ============================================================================
