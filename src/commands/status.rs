use anyhow::Result;
use std::env;

use crate::commands::CommandReport;
use crate::lens::audit::audit_log_path;
use crate::lens::cache::FacetCache;
use crate::lens::config::{load_config, resolve_config_path, validate};
use crate::lens::paths::resolve_paths;
use crate::lens::providers::resolve_remote_config;

include!(concat!(env!("OUT_DIR"), "/facetlens_env_allowlist.rs"));

fn configured_env_keys() -> Vec<&'static str> {
    GENERATED_ENV_ALLOWLIST
        .iter()
        .copied()
        .filter(|key| env::var(key).is_ok_and(|v| !v.trim().is_empty()))
        .collect()
}

pub async fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("facetlens_home={}", paths.facetlens_home.display()));
    report.detail(format!("facets_dir={}", paths.facets_dir.display()));
    report.detail(format!("sessions_dir={}", paths.sessions_dir.display()));
    report.detail(format!("audit_log={}", audit_log_path(&paths).display()));
    match resolve_config_path() {
        Some(path) if path.exists() => report.detail(format!("config={}", path.display())),
        Some(path) => report.detail(format!("config={} (absent, using defaults)", path.display())),
        None => report.detail("config=<none>"),
    }

    let cached = FacetCache::new(&paths.facets_dir).len().await;
    report.detail(format!("cached_facets={cached}"));

    let env_keys = configured_env_keys();
    if !env_keys.is_empty() {
        report.detail(format!("env_overrides={}", env_keys.join(",")));
    }

    match load_config() {
        Ok(cfg) => {
            report.detail(format!("max_sessions={}", cfg.analysis.max_sessions));
            report.detail(format!("concurrency={}", cfg.analysis.concurrency));
            report.detail(format!("output={}", cfg.analysis.output));
            if let Err(err) = validate(&cfg) {
                report.issue(err.to_string());
            }
            match resolve_remote_config(&cfg.model) {
                Ok(remote) => {
                    report.detail(format!("provider={}", remote.provider.label()));
                    report.detail(format!("model={}", remote.model));
                }
                Err(err) => report.issue(err.to_string()),
            }
        }
        Err(err) => report.issue(format!("config load failed: {err:#}")),
    }

    if !paths.sessions_dir.exists() {
        report.issue(format!(
            "missing sessions dir ({})",
            paths.sessions_dir.display()
        ));
    }

    Ok(report)
}
