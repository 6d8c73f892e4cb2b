use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// One recorded session as seen by the session reader.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub project: String,
    pub message_count: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub full_path: PathBuf,
}

impl SessionSummary {
    pub fn duration_secs(&self) -> i64 {
        (self.modified - self.created).num_seconds()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CondensedTranscript {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

impl CondensedTranscript {
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Model-extracted description of one session. Everything except the
/// identifier is opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFacet {
    #[serde(rename = "sessionId", default)]
    pub session_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl SessionFacet {
    /// Parse model JSON into a facet owned by `session_id`, discarding
    /// whatever identifier the model produced.
    pub fn from_model_json(session_id: &str, raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut fields) = value else {
            return Err(anyhow!("facet payload is not a JSON object"));
        };
        fields.remove("sessionId");
        fields.remove("session_id");
        Ok(Self {
            session_id: session_id.to_string(),
            fields,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtAGlance {
    pub whats_working: String,
    pub whats_hindering: String,
    pub quick_wins: String,
    pub ambitious_workflows: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Finding {
    pub title: String,
    pub description: String,
}

/// Cross-session report. `Default` is the empty synthesis used whenever the
/// model output cannot be parsed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSynthesis {
    pub at_a_glance: AtAGlance,
    pub impressive_things: Vec<Finding>,
    pub where_things_go_wrong: Vec<Finding>,
    pub features_to_try: Vec<Finding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub session_count: usize,
    pub message_count: u64,
}

#[cfg(test)]
mod tests {
    use super::{LlmSynthesis, SessionFacet};
    use serde_json::json;

    #[test]
    fn from_model_json_overwrites_model_identifier() {
        let facet = SessionFacet::from_model_json(
            "real-id",
            r#"{"sessionId": 42, "goal": "ship the parser", "session_id": "bogus"}"#,
        )
        .expect("facet parses");
        assert_eq!(facet.session_id, "real-id");
        assert_eq!(facet.fields.get("goal"), Some(&json!("ship the parser")));
        assert!(!facet.fields.contains_key("session_id"));
    }

    #[test]
    fn from_model_json_rejects_non_objects() {
        assert!(SessionFacet::from_model_json("s", "[1, 2]").is_err());
        assert!(SessionFacet::from_model_json("s", "not json").is_err());
    }

    #[test]
    fn facet_serializes_with_flat_fields() {
        let facet = SessionFacet::from_model_json("abc", r#"{"outcome": "done"}"#).expect("facet");
        let value = serde_json::to_value(&facet).expect("serialize");
        assert_eq!(value, json!({"sessionId": "abc", "outcome": "done"}));
    }

    #[test]
    fn synthesis_accepts_partial_objects() {
        let synthesis: LlmSynthesis = serde_json::from_str(
            r#"{"atAGlance": {"quickWins": "use plan mode"}, "featuresToTry": [{"title": "hooks"}]}"#,
        )
        .expect("partial synthesis parses");
        assert_eq!(synthesis.at_a_glance.quick_wins, "use plan mode");
        assert_eq!(synthesis.features_to_try.len(), 1);
        assert!(synthesis.impressive_things.is_empty());
    }

    #[test]
    fn synthesis_default_is_empty() {
        let empty = LlmSynthesis::default();
        assert!(empty.at_a_glance.whats_working.is_empty());
        assert!(empty.where_things_go_wrong.is_empty());
    }
}
