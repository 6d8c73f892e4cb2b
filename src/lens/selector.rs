use crate::lens::types::SessionSummary;
use std::collections::HashSet;

pub const MIN_MESSAGES: u64 = 3;
pub const MIN_DURATION_SECS: i64 = 60;

pub fn is_eligible(session: &SessionSummary) -> bool {
    session.message_count >= MIN_MESSAGES && session.duration_secs() >= MIN_DURATION_SECS
}

/// Build the extraction work list: eligible sessions, richest first, capped
/// at `max_sessions`. A repeated identifier keeps only its richest entry so
/// no two work items share a cache key.
pub fn select_sessions(sessions: &[SessionSummary], max_sessions: usize) -> Vec<SessionSummary> {
    let mut eligible: Vec<SessionSummary> =
        sessions.iter().filter(|s| is_eligible(s)).cloned().collect();
    eligible.sort_by(|a, b| b.message_count.cmp(&a.message_count));
    let mut seen = HashSet::new();
    eligible.retain(|s| seen.insert(s.session_id.clone()));
    eligible.truncate(max_sessions);
    eligible
}
