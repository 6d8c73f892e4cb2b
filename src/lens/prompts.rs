use crate::lens::types::{CondensedTranscript, ProjectSummary, SessionFacet};

const MAX_TRANSCRIPT_CHARS: usize = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub content: String,
}

const FACET_SYSTEM: &str = "You analyze a single recorded session between a developer and an AI coding assistant. \
Respond with one JSON object and nothing else. Use these keys: \
\"goal\" (string, what the developer was trying to do), \
\"outcome\" (one of \"achieved\", \"partially_achieved\", \"not_achieved\", \"unclear\"), \
\"sessionType\" (string, e.g. \"debugging\", \"feature\", \"refactor\", \"exploration\"), \
\"frictionPoints\" (array of short strings), \
\"helpfulPatterns\" (array of short strings), \
\"toolsUsed\" (array of tool names), \
\"summary\" (two sentences at most).";

const SYNTHESIS_SYSTEM: &str = "You review per-session analyses of a developer's work with an AI coding assistant \
and write a candid cross-session report. Respond with one JSON object and nothing else, shaped as: \
{\"atAGlance\": {\"whatsWorking\": string, \"whatsHindering\": string, \"quickWins\": string, \"ambitiousWorkflows\": string}, \
\"impressiveThings\": [{\"title\": string, \"description\": string}], \
\"whereThingsGoWrong\": [{\"title\": string, \"description\": string}], \
\"featuresToTry\": [{\"title\": string, \"description\": string}]}. \
Keep each list to five entries or fewer and ground every claim in the sessions provided.";

pub fn facet_extraction_prompt(transcript: &CondensedTranscript) -> Prompt {
    let mut body = String::new();
    for turn in &transcript.turns {
        if body.len() >= MAX_TRANSCRIPT_CHARS {
            body.push_str("[transcript truncated]\n");
            break;
        }
        body.push_str(&format!("[{}] {}\n", turn.role, turn.text));
    }

    Prompt {
        system: FACET_SYSTEM.to_string(),
        content: format!(
            "Session id: {}\nTurns: {}\n\nTranscript:\n{}",
            transcript.session_id,
            transcript.turns.len(),
            body
        ),
    }
}

pub fn synthesis_prompt(
    facets: &[SessionFacet],
    total_sessions: usize,
    projects: Option<&[ProjectSummary]>,
) -> Prompt {
    let mut content = format!(
        "Total recorded sessions: {total_sessions}\nSessions analyzed in depth: {}\n",
        facets.len()
    );

    if let Some(projects) = projects.filter(|p| !p.is_empty()) {
        content.push_str("\nProjects:\n");
        for project in projects {
            content.push_str(&format!(
                "- {}: {} sessions, {} messages\n",
                project.name, project.session_count, project.message_count
            ));
        }
    }

    content.push_str("\nSession facets (JSON lines):\n");
    for facet in facets {
        if let Ok(line) = serde_json::to_string(facet) {
            content.push_str(&line);
            content.push('\n');
        }
    }

    Prompt {
        system: SYNTHESIS_SYSTEM.to_string(),
        content,
    }
}
