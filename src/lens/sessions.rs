use crate::lens::types::{ProjectSummary, SessionSummary};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::UNIX_EPOCH;

#[derive(Debug, Clone)]
pub struct ProjectSessions {
    pub project: String,
    pub sessions: Vec<SessionSummary>,
}

fn parse_timestamp(entry: &Value) -> Option<DateTime<Utc>> {
    let raw = entry.get("timestamp").and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn file_mtime(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH))
}

fn summarize_session_file(project: &str, path: &Path) -> Result<Option<SessionSummary>> {
    let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) else {
        return Ok(None);
    };
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut message_count = 0u64;
    let mut first: Option<DateTime<Utc>> = None;
    let mut last: Option<DateTime<Utc>> = None;
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("failed to read line from {}", path.display()))?;
        let Ok(entry) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        if matches!(
            entry.get("type").and_then(Value::as_str),
            Some("user") | Some("assistant")
        ) {
            message_count += 1;
        }
        if let Some(ts) = parse_timestamp(&entry) {
            first = Some(first.map_or(ts, |f| f.min(ts)));
            last = Some(last.map_or(ts, |l| l.max(ts)));
        }
    }

    let mtime = file_mtime(path);
    Ok(Some(SessionSummary {
        session_id: session_id.to_string(),
        project: project.to_string(),
        message_count,
        created: first.unwrap_or(mtime),
        modified: last.unwrap_or(mtime),
        full_path: path.to_path_buf(),
    }))
}

/// Scan `<dir>/<project>/*.jsonl`. Unreadable session files are skipped with
/// a warning; a missing root yields no projects.
pub fn read_sessions(dir: &Path) -> Result<Vec<ProjectSessions>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut projects = Vec::new();
    let read_dir = fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?;
    for entry in read_dir {
        let project_dir = entry?.path();
        if !project_dir.is_dir() {
            continue;
        }
        let project = project_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let mut sessions = Vec::new();
        for file in fs::read_dir(&project_dir)
            .with_context(|| format!("failed to read {}", project_dir.display()))?
        {
            let path = file?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            match summarize_session_file(&project, &path) {
                Ok(Some(summary)) => sessions.push(summary),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %format!("{err:#}"), "skipping unreadable session");
                }
            }
        }
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        projects.push(ProjectSessions { project, sessions });
    }

    projects.sort_by(|a, b| a.project.cmp(&b.project));
    Ok(projects)
}

/// Keep projects whose name contains `filter`, ignoring case.
pub fn filter_projects(projects: Vec<ProjectSessions>, filter: Option<&str>) -> Vec<ProjectSessions> {
    let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
        return projects;
    };
    let needle = filter.to_lowercase();
    projects
        .into_iter()
        .filter(|p| p.project.to_lowercase().contains(&needle))
        .collect()
}

/// Keep sessions created within the last `days` days of `now`.
pub fn filter_recent(
    sessions: Vec<SessionSummary>,
    days: Option<u32>,
    now: DateTime<Utc>,
) -> Vec<SessionSummary> {
    let Some(days) = days else {
        return sessions;
    };
    // A window reaching past the earliest representable time keeps everything.
    let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(days))) else {
        return sessions;
    };
    sessions.into_iter().filter(|s| s.created >= cutoff).collect()
}

pub fn project_summaries(projects: &[ProjectSessions]) -> Vec<ProjectSummary> {
    projects
        .iter()
        .filter(|p| !p.sessions.is_empty())
        .map(|p| ProjectSummary {
            name: p.project.clone(),
            session_count: p.sessions.len(),
            message_count: p.sessions.iter().map(|s| s.message_count).sum(),
        })
        .collect()
}
