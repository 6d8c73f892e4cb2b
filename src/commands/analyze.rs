use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::commands::CommandReport;
use crate::lens::audit;
use crate::lens::cache::FacetCache;
use crate::lens::client::{DEFAULT_MAX_ATTEMPTS, ResilientClient, RetryPolicy};
use crate::lens::config::{LensConfig, load_config, validate};
use crate::lens::paths::resolve_paths;
use crate::lens::pipeline::{AnalysisOutput, AnalyzeOptions, Pipeline};
use crate::lens::providers::{build_transport, resolve_remote_config};
use crate::lens::scheduler::OutcomeCounts;
use crate::lens::sessions::{filter_projects, filter_recent, project_summaries, read_sessions};
use crate::lens::transcript::JsonlTranscripts;
use crate::lens::types::{LlmSynthesis, SessionFacet};

#[derive(Debug, Clone, Default)]
pub struct AnalyzeCommandOptions {
    pub output: Option<String>,
    pub project: Option<String>,
    pub days: Option<u32>,
    pub max_sessions: Option<usize>,
    pub concurrency: Option<usize>,
    pub clear_cache: bool,
}

#[derive(Debug, Serialize)]
struct AnalysisReport<'a> {
    generated_at: String,
    provider: &'a str,
    model: &'a str,
    total_sessions: usize,
    analyzed_sessions: usize,
    outcomes: OutcomeCounts,
    synthesis: &'a LlmSynthesis,
    facets: &'a [SessionFacet],
}

fn apply_overrides(cfg: &mut LensConfig, opts: &AnalyzeCommandOptions) {
    if let Some(output) = &opts.output {
        cfg.analysis.output = output.clone();
    }
    if let Some(max_sessions) = opts.max_sessions {
        cfg.analysis.max_sessions = max_sessions;
    }
    if let Some(concurrency) = opts.concurrency {
        cfg.analysis.concurrency = concurrency;
    }
}

fn print_progress(done: usize, total: usize) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\ranalyzing sessions... {done}/{total}");
    if done == total {
        let _ = writeln!(stderr);
    }
    let _ = stderr.flush();
}

fn write_report(path: &Path, report: &AnalysisReport<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(report)?;
    fs::write(path, format!("{data}\n"))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub async fn run(opts: &AnalyzeCommandOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut cfg = load_config()?;
    apply_overrides(&mut cfg, opts);
    validate(&cfg)?;

    let mut report = CommandReport::new("analyze");

    let remote = resolve_remote_config(&cfg.model)?;
    let transport = build_transport(
        &remote,
        Duration::from_secs(cfg.model.request_timeout_secs),
    )?;
    let client = ResilientClient::new(transport, remote.model.clone()).with_policy(RetryPolicy {
        max_attempts: DEFAULT_MAX_ATTEMPTS,
        base_delay: Duration::from_millis(cfg.model.retry_base_delay_ms),
    });

    let projects = filter_projects(read_sessions(&paths.sessions_dir)?, opts.project.as_deref());
    let summaries = project_summaries(&projects);
    let sessions = filter_recent(
        projects.into_iter().flat_map(|p| p.sessions).collect(),
        opts.days,
        Utc::now(),
    );
    tracing::info!(
        sessions = sessions.len(),
        projects = summaries.len(),
        provider = client.provider_label(),
        model = %remote.model,
        "sessions loaded"
    );

    let cache = FacetCache::new(&paths.facets_dir);
    let transcripts = JsonlTranscripts;
    let pipeline = Pipeline::new(&cache, &client, &transcripts);
    let AnalysisOutput {
        synthesis,
        facets,
        outcomes,
        cleared_entries,
    } = pipeline
        .run_facet_extraction(
            &sessions,
            AnalyzeOptions {
                max_sessions: cfg.analysis.max_sessions,
                concurrency: cfg.analysis.concurrency,
                clear_cache: opts.clear_cache,
                projects: Some(&summaries),
                on_progress: Some(&print_progress),
            },
        )
        .await?;

    let counts = OutcomeCounts::tally(&outcomes);
    let output_path = Path::new(&cfg.analysis.output);
    write_report(
        output_path,
        &AnalysisReport {
            generated_at: Utc::now().to_rfc3339(),
            provider: client.provider_label(),
            model: &remote.model,
            total_sessions: sessions.len(),
            analyzed_sessions: outcomes.len(),
            outcomes: counts,
            synthesis: &synthesis,
            facets: &facets,
        },
    )?;

    let summary = format!(
        "sessions={} selected={} facets={} cache_hits={} extracted={} skipped={} failed={}",
        sessions.len(),
        outcomes.len(),
        facets.len(),
        counts.cache_hits,
        counts.extracted,
        counts.skipped,
        counts.failed
    );
    if let Err(err) = audit::append_event(&paths, "analyze", "ok", &summary) {
        tracing::warn!(error = %format!("{err:#}"), "audit log append failed");
    }

    if let Some(removed) = cleared_entries {
        report.detail(format!("cache_cleared_entries={removed}"));
    }
    report.detail(format!("provider={}", client.provider_label()));
    report.detail(format!("model={}", remote.model));
    report.detail(format!("projects={}", summaries.len()));
    report.detail(format!("sessions={}", sessions.len()));
    report.detail(format!("selected={}", outcomes.len()));
    report.detail(format!("facets={}", facets.len()));
    report.detail(format!(
        "outcomes=cache_hits:{},extracted:{},skipped:{},failed:{}",
        counts.cache_hits, counts.extracted, counts.skipped, counts.failed
    ));
    report.detail(format!("output={}", output_path.display()));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::{AnalyzeCommandOptions, apply_overrides};
    use crate::lens::config::LensConfig;

    #[test]
    fn cli_flags_override_config_values() {
        let mut cfg = LensConfig::default();
        let opts = AnalyzeCommandOptions {
            output: Some("out/report.json".into()),
            concurrency: Some(2),
            ..AnalyzeCommandOptions::default()
        };
        apply_overrides(&mut cfg, &opts);
        assert_eq!(cfg.analysis.output, "out/report.json");
        assert_eq!(cfg.analysis.concurrency, 2);
        assert_eq!(cfg.analysis.max_sessions, 200);
    }
}
