// crates/core/src/parser.rs
//! Streaming JSONL parser for session log files.
//!
//! One forward pass per file: counts messages, aggregates token/model/tool
//! usage, collects searchable text, and picks up the recorded working
//! directory. Malformed lines are skipped, never fatal; only unrecoverable
//! I/O errors propagate to the caller.

use crate::error::ParseError;
use crate::types::*;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Each message contributes at most this many characters of searchable text.
const PER_MESSAGE_TEXT_CAP: usize = 2_000;

/// The concatenated searchable text is truncated to this many characters.
const TOTAL_TEXT_CAP: usize = 100_000;

/// Malformed-line warnings per file before suppression.
const MALFORMED_WARN_LIMIT: usize = 3;

/// Parse one session log file into a [`ParseResult`].
///
/// The file is read as a lazy sequence of lines; memory use is bounded by a
/// single line plus the capped searchable-text buffer. Blank lines and lines
/// that fail JSON parsing are skipped. A file that is 100% malformed still
/// yields an empty-ish result.
///
/// # Errors
/// Only open/read failures: `NotFound`, `PermissionDenied`, or `Io`.
pub async fn parse_session_file(file_path: &Path) -> Result<ParseResult, ParseError> {
    let file = File::open(file_path)
        .await
        .map_err(|e| ParseError::io(file_path, e))?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut result = ParseResult::default();
    // value = (count, first-seen index) so ties resolve to the earliest model
    let mut model_counts: HashMap<String, (i64, usize)> = HashMap::new();
    let mut searchable = String::new();
    let mut searchable_chars = 0usize;
    let mut malformed = 0usize;
    let mut line_number = 0usize;

    while let Some(raw) = lines
        .next_line()
        .await
        .map_err(|e| ParseError::io(file_path, e))?
    {
        line_number += 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let entry: LogLine = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) => {
                malformed += 1;
                if malformed <= MALFORMED_WARN_LIMIT {
                    warn!(
                        "skipping malformed line {} in {}: {}",
                        line_number,
                        file_path.display(),
                        e
                    );
                }
                continue;
            }
        };

        // cwd may appear after summary/header lines; keep scanning until found.
        if result.cwd.is_none() {
            result.cwd = entry
                .cwd
                .clone()
                .or_else(|| entry.message.as_ref().and_then(|m| m.cwd.clone()));
        }

        let is_assistant = entry.entry_type.as_deref() == Some("assistant");
        if !is_assistant && entry.entry_type.as_deref() != Some("user") {
            continue;
        }
        let Some(message) = entry.message else {
            continue;
        };

        result.message_count += 1;

        if let Some(model) = &message.model {
            let first_seen = model_counts.len();
            model_counts.entry(model.clone()).or_insert((0, first_seen)).0 += 1;
        }

        if is_assistant {
            if let Some(usage) = &message.usage {
                result.token_usage.input += usage.input_tokens.unwrap_or(0);
                result.token_usage.output += usage.output_tokens.unwrap_or(0);
            }
            if let Some(content) = &message.content {
                for name in tool_use_names(content) {
                    result.tool_usage.total += 1;
                    *result.tool_usage.per_name.entry(name).or_insert(0) += 1;
                }
            }
        }

        if searchable_chars < TOTAL_TEXT_CAP {
            if let Some(content) = &message.content {
                let text = extract_text(content);
                if !text.is_empty() {
                    if !searchable.is_empty() {
                        searchable.push('\n');
                        searchable_chars += 1;
                    }
                    searchable_chars += push_truncated(&mut searchable, &text, PER_MESSAGE_TEXT_CAP);
                }
            }
        }
    }

    if malformed > MALFORMED_WARN_LIMIT {
        debug!(
            "{} additional malformed lines suppressed in {}",
            malformed - MALFORMED_WARN_LIMIT,
            file_path.display()
        );
    }

    result.token_usage.total = result.token_usage.input + result.token_usage.output;
    result.model_info.primary = model_counts
        .iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(name, _)| name.clone());
    result.model_info.counts = model_counts.into_iter().map(|(k, (c, _))| (k, c)).collect();
    result.searchable_text = truncate_chars(searchable, TOTAL_TEXT_CAP);

    Ok(result)
}

/// Extract user-visible text from message content.
///
/// Strings are taken verbatim; block arrays concatenate the `text` of text
/// blocks separated by newlines; a single text block yields its text;
/// everything else is empty. Tool results are deliberately excluded.
fn extract_text(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        MessageContent::Single(block) => match block.as_ref() {
            ContentBlock::Text { text } => text.clone(),
            _ => String::new(),
        },
    }
}

/// Names of every `tool_use` block (with a non-empty name) in the content.
fn tool_use_names(content: &MessageContent) -> Vec<String> {
    let from_block = |block: &ContentBlock| match block {
        ContentBlock::ToolUse { name, .. } if !name.is_empty() => Some(name.clone()),
        _ => None,
    };
    match content {
        MessageContent::Text(_) => Vec::new(),
        MessageContent::Blocks(blocks) => blocks.iter().filter_map(from_block).collect(),
        MessageContent::Single(block) => from_block(block).into_iter().collect(),
    }
}

/// Append at most `cap` characters of `text` to `buf`, returning the number
/// of characters appended.
fn push_truncated(buf: &mut String, text: &str, cap: usize) -> usize {
    let mut taken = 0usize;
    for ch in text.chars() {
        if taken >= cap {
            break;
        }
        buf.push(ch);
        taken += 1;
    }
    taken
}

/// Truncate a string to `cap` characters, respecting char boundaries.
fn truncate_chars(s: String, cap: usize) -> String {
    match s.char_indices().nth(cap) {
        Some((byte_idx, _)) => {
            let mut s = s;
            s.truncate(byte_idx);
            s
        }
        None => s,
    }
}

// ============================================================================
// Tests
// ============================================================================
