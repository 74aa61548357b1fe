// crates/core/src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fully indexed session, one per log file.
///
/// `id` is the filename stem for top-level sessions and
/// `"<parent_id>_<stem>"` for subagents, because the same short agent
/// filename reappears under many parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    /// Absolute path of the backing `.jsonl` file. Unique per session.
    pub file_path: String,
    pub filename: String,
    /// Canonical project name. May be rewritten by identity resolution
    /// after a full indexing pass.
    pub project: String,
    /// Working directory as recorded inside the log, verbatim.
    pub cwd: Option<String>,
    pub message_count: i64,
    pub file_size: i64,
    /// Epoch milliseconds.
    pub last_modified: i64,
    /// Epoch milliseconds.
    pub created: i64,
    /// Epoch milliseconds.
    pub indexed_at: i64,
    pub tokens_total: i64,
    pub tokens_input: i64,
    pub tokens_output: i64,
    /// Most frequent model identifier across the session's messages.
    pub primary_model: Option<String>,
    pub is_subagent: bool,
    /// Always set when `is_subagent` is true.
    pub parent_id: Option<String>,
}

/// Token totals aggregated from assistant messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
    pub total: i64,
}

/// Per-model message tallies. `primary` is the most frequent model,
/// ties broken by first appearance in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInfo {
    pub primary: Option<String>,
    pub counts: HashMap<String, i64>,
}

/// Tool-call tallies aggregated from assistant content blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolUsage {
    pub total: i64,
    pub per_name: HashMap<String, i64>,
}

/// Everything a single streaming pass over one log file produces.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub message_count: i64,
    pub token_usage: TokenUsage,
    pub model_info: ModelInfo,
    pub tool_usage: ToolUsage,
    /// Concatenated user-visible text, capped per message and in total.
    pub searchable_text: String,
    /// First non-null `cwd` seen at the top level or under `message`.
    pub cwd: Option<String>,
}

// ============================================================================
// JSONL wire types (deserializing the assistant's log format)
// ============================================================================

/// One line of a session log. Lines missing `type` or `message`, or with a
/// `type` other than user/assistant, never contribute to message aggregates.
#[derive(Debug, Clone, Deserialize)]
pub struct LogLine {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub message: Option<LogMessage>,
    pub cwd: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogMessage {
    #[serde(default)]
    pub content: Option<MessageContent>,
    pub model: Option<String>,
    pub usage: Option<UsageBlock>,
    pub cwd: Option<String>,
}

/// Assistant-only token accounting. Cache-related counters exist in the wire
/// format but are not aggregated here.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageBlock {
    #[serde(default)]
    pub input_tokens: Option<i64>,
    #[serde(default)]
    pub output_tokens: Option<i64>,
}

/// `message.content` is a string, a single block, or an array of blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Single(Box<ContentBlock>),
}

/// A content block with known variants plus a raw-JSON catch-all, so
/// unrecognized block shapes are skipped without failing the line.
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: Option<String>,
        name: String,
        input: Option<serde_json::Value>,
    },
    ToolResult {
        tool_use_id: Option<String>,
        content: Option<serde_json::Value>,
    },
    Other(serde_json::Value),
}

impl<'de> Deserialize<'de> for ContentBlock {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let block = match value.get("type").and_then(serde_json::Value::as_str) {
            Some("text") => match value.get("text").and_then(serde_json::Value::as_str) {
                Some(text) => ContentBlock::Text {
                    text: text.to_string(),
                },
                None => ContentBlock::Other(value),
            },
            Some("tool_use") => match value.get("name").and_then(serde_json::Value::as_str) {
                Some(name) => ContentBlock::ToolUse {
                    id: value
                        .get("id")
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string),
                    name: name.to_string(),
                    input: value.get("input").cloned(),
                },
                None => ContentBlock::Other(value),
            },
            Some("tool_result") => ContentBlock::ToolResult {
                tool_use_id: value
                    .get("tool_use_id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                content: value.get("content").cloned(),
            },
            _ => ContentBlock::Other(value),
        };
        Ok(block)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_user_entry() {
        let json = r#"{"type":"user","message":{"content":"Hello"},"cwd":"/home/u/proj"}"#;
        let line: LogLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.entry_type.as_deref(), Some("user"));
        assert_eq!(line.cwd.as_deref(), Some("/home/u/proj"));
        assert!(line.message.is_some());
    }

    #[test]
    fn test_log_line_summary_entry_has_no_message() {
        let json = r#"{"type":"summary","summary":"Earlier work"}"#;
        let line: LogLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.entry_type.as_deref(), Some("summary"));
        assert!(line.message.is_none());
    }

    #[test]
    fn test_message_content_string() {
        let content: MessageContent = serde_json::from_str(r#""Hello world""#).unwrap();
        assert!(matches!(content, MessageContent::Text(t) if t == "Hello world"));
    }

    #[test]
    fn test_message_content_blocks() {
        let json = r#"[{"type":"text","text":"Hi"},{"type":"tool_use","id":"t1","name":"Read","input":{}}]"#;
        let content: MessageContent = serde_json::from_str(json).unwrap();
        match content {
            MessageContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 2);
                assert!(matches!(&blocks[0], ContentBlock::Text { text } if text == "Hi"));
                assert!(matches!(&blocks[1], ContentBlock::ToolUse { name, .. } if name == "Read"));
            }
            other => panic!("expected blocks, got {other:?}"),
        }
    }

    #[test]
    fn test_message_content_single_block() {
        let json = r#"{"type":"text","text":"standalone"}"#;
        let content: MessageContent = serde_json::from_str(json).unwrap();
        match content {
            MessageContent::Single(block) => {
                assert!(matches!(*block, ContentBlock::Text { ref text } if text == "standalone"));
            }
            other => panic!("expected single block, got {other:?}"),
        }
    }

    #[test]
    fn test_content_block_unknown_type_is_other() {
        let json = r#"{"type":"thinking","thinking":"hmm"}"#;
        let block: ContentBlock = serde_json::from_str(json).unwrap();
        assert!(matches!(block, ContentBlock::Other(_)));
    }

    #[test]
    fn test_content_block_missing_type_is_other() {
        let json = r#"{"data":123}"#;
        let block: ContentBlock = serde_json::from_str(json).unwrap();
        assert!(matches!(block, ContentBlock::Other(_)));
    }

    #[test]
    fn test_tool_result_block() {
        let json = r#"{"type":"tool_result","tool_use_id":"t1","content":"ok"}"#;
        let block: ContentBlock = serde_json::from_str(json).unwrap();
        match block {
            ContentBlock::ToolResult { tool_use_id, .. } => {
                assert_eq!(tool_use_id.as_deref(), Some("t1"));
            }
            other => panic!("expected tool_result, got {other:?}"),
        }
    }

    #[test]
    fn test_usage_block_tolerates_cache_fields() {
        let json = r#"{"input_tokens":10,"output_tokens":5,"cache_read_input_tokens":99,"service_tier":"standard"}"#;
        let usage: UsageBlock = serde_json::from_str(json).unwrap();
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(5));
    }
}
