use crate::lens::types::{CondensedTranscript, SessionSummary, Turn};
use crate::lens::util::truncate_with_ellipsis;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

const MAX_TURN_CHARS: usize = 2_000;
const MAX_TURNS: usize = 400;

/// Supplies condensed transcripts to the extraction scheduler.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn load(&self, session: &SessionSummary) -> Result<CondensedTranscript>;
}

/// Reads session JSONL files from disk.
pub struct JsonlTranscripts;

#[async_trait]
impl TranscriptSource for JsonlTranscripts {
    async fn load(&self, session: &SessionSummary) -> Result<CondensedTranscript> {
        read_condensed_transcript(&session.session_id, &session.full_path).await
    }
}

pub async fn read_condensed_transcript(session_id: &str, path: &Path) -> Result<CondensedTranscript> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read transcript {}", path.display()))?;
    Ok(condense(session_id, &raw))
}

pub(crate) fn condense(session_id: &str, raw: &str) -> CondensedTranscript {
    let mut turns = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<Value>(trimmed) else {
            continue;
        };
        if let Some(turn) = extract_turn(&entry) {
            turns.push(turn);
            if turns.len() >= MAX_TURNS {
                break;
            }
        }
    }
    CondensedTranscript {
        session_id: session_id.to_string(),
        turns,
    }
}

fn extract_turn(entry: &Value) -> Option<Turn> {
    let kind = entry.get("type").and_then(Value::as_str)?;
    if kind != "user" && kind != "assistant" {
        return None;
    }
    let message = entry.get("message")?;
    let role = message
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or(kind)
        .to_string();

    let text = match message.get("content")? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(parts) => {
            let mut pieces = Vec::new();
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = part.get("text").and_then(Value::as_str)
                            && !text.trim().is_empty()
                        {
                            pieces.push(text.trim().to_string());
                        }
                    }
                    Some("tool_use") => {
                        let name = part.get("name").and_then(Value::as_str).unwrap_or("unknown");
                        pieces.push(format!("[tool: {name}]"));
                    }
                    _ => {}
                }
            }
            pieces.join("\n")
        }
        _ => return None,
    };

    if text.is_empty() {
        return None;
    }
    Some(Turn {
        role,
        text: truncate_with_ellipsis(&text, MAX_TURN_CHARS),
    })
}

#[cfg(test)]
mod tests {
    use super::{MAX_TURN_CHARS, condense, read_condensed_transcript};
    use tempfile::tempdir;

    #[test]
    fn condense_keeps_user_and_assistant_text() {
        let raw = concat!(
            r#"{"type":"summary","summary":"ignored"}"#, "\n",
            r#"{"type":"user","message":{"role":"user","content":"fix the flaky test"}}"#, "\n",
            "not json at all\n",
            r#"{"type":"assistant","message":{"role":"assistant","content":[{"type":"text","text":"Looking now."},{"type":"tool_use","name":"Bash","input":{"command":"cargo test"}}]}}"#, "\n",
            r#"{"type":"user","message":{"role":"user","content":[{"type":"tool_result","content":"ok"}]}}"#, "\n",
        );
        let transcript = condense("s1", raw);
        assert_eq!(transcript.session_id, "s1");
        assert_eq!(transcript.turns.len(), 2);
        assert_eq!(transcript.turns[0].role, "user");
        assert_eq!(transcript.turns[0].text, "fix the flaky test");
        assert_eq!(transcript.turns[1].text, "Looking now.\n[tool: Bash]");
    }

    #[test]
    fn long_turns_are_truncated() {
        let long = "x".repeat(MAX_TURN_CHARS + 50);
        let raw = format!(
            "{{\"type\":\"user\",\"message\":{{\"role\":\"user\",\"content\":\"{long}\"}}}}\n"
        );
        let transcript = condense("s", &raw);
        assert_eq!(transcript.turns[0].text.chars().count(), MAX_TURN_CHARS + 1);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let got = read_condensed_transcript("s", &tmp.path().join("nope.jsonl")).await;
        assert!(got.is_err());
    }
}
