use crate::lens::client::{LanguageModel, SYNTHESIS_MAX_TOKENS};
use crate::lens::extract::extract_json;
use crate::lens::prompts::synthesis_prompt;
use crate::lens::types::{LlmSynthesis, ProjectSummary, SessionFacet};

/// One model call over every collected facet. Falls back to the empty
/// synthesis on any failure.
pub async fn synthesize(
    model: &dyn LanguageModel,
    facets: &[SessionFacet],
    total_sessions: usize,
    projects: Option<&[ProjectSummary]>,
) -> LlmSynthesis {
    let prompt = synthesis_prompt(facets, total_sessions, projects);
    let raw = model
        .call(
            model.default_model(),
            &prompt.system,
            &prompt.content,
            SYNTHESIS_MAX_TOKENS,
        )
        .await;
    parse_synthesis(&raw)
}

pub fn parse_synthesis(raw: &str) -> LlmSynthesis {
    if raw.is_empty() {
        tracing::warn!("synthesis response was empty; using empty synthesis");
        return LlmSynthesis::default();
    }
    match serde_json::from_str::<LlmSynthesis>(&extract_json(raw)) {
        Ok(synthesis) => synthesis,
        Err(err) => {
            tracing::warn!(error = %err, "synthesis response unparseable; using empty synthesis");
            LlmSynthesis::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_synthesis;
    use crate::lens::types::LlmSynthesis;

    #[test]
    fn fenced_synthesis_parses() {
        let raw = "```json\n{\"atAGlance\": {\"whatsWorking\": \"tight loops\"}, \"impressiveThings\": [{\"title\": \"TDD\", \"description\": \"tests first\"}]}\n```";
        let got = parse_synthesis(raw);
        assert_eq!(got.at_a_glance.whats_working, "tight loops");
        assert_eq!(got.impressive_things[0].title, "TDD");
    }

    #[test]
    fn wrong_shape_falls_back_to_default() {
        assert_eq!(parse_synthesis("[1, 2, 3]"), LlmSynthesis::default());
        assert_eq!(
            parse_synthesis("{\"atAGlance\": 5}"),
            LlmSynthesis::default()
        );
        assert_eq!(parse_synthesis("sorry, no report"), LlmSynthesis::default());
        assert_eq!(parse_synthesis(""), LlmSynthesis::default());
    }
}
