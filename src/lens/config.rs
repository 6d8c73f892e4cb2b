use crate::error::FacetLensError;
use crate::lens::scheduler::check_concurrency;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub max_sessions: usize,
    pub concurrency: usize,
    pub output: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_sessions: 200,
            concurrency: 5,
            output: "./facetlens-report.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            retry_base_delay_ms: crate::lens::client::DEFAULT_BASE_DELAY_MS,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LensConfig {
    pub analysis: AnalysisSettings,
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLensConfig {
    analysis: Option<AnalysisSettings>,
    model: Option<ModelSettings>,
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

pub fn validate(cfg: &LensConfig) -> Result<(), FacetLensError> {
    check_concurrency(cfg.analysis.concurrency)?;
    if cfg.analysis.max_sessions == 0 {
        return Err(FacetLensError::InvalidConfig(
            "max sessions must be >= 1".to_string(),
        ));
    }
    if cfg.analysis.output.trim().is_empty() {
        return Err(FacetLensError::InvalidConfig(
            "output path cannot be empty".to_string(),
        ));
    }
    if cfg.model.request_timeout_secs == 0 {
        return Err(FacetLensError::InvalidConfig(
            "request timeout must be >= 1 second".to_string(),
        ));
    }
    Ok(())
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var("FACETLENS_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    if let Ok(home) = env::var("FACETLENS_HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed).join("facetlens.toml"));
        }
    }

    let home = dirs::home_dir()?;
    Some(home.join(".facetlens").join("facetlens.toml"))
}

fn merge_toml(base: &mut LensConfig, raw: &str) -> Result<()> {
    let parsed: PartialLensConfig = toml::from_str(raw)?;
    if let Some(analysis) = parsed.analysis {
        base.analysis = analysis;
    }
    if let Some(model) = parsed.model {
        base.model = model;
    }
    Ok(())
}

fn merge_file_config(base: &mut LensConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)?;
    merge_toml(base, &raw)
        .map_err(|err| anyhow!("failed to parse facetlens config {}: {err}", path.display()))
}

fn apply_env_overrides(cfg: &mut LensConfig) {
    cfg.analysis.max_sessions = env_or_usize("FACETLENS_MAX_SESSIONS", cfg.analysis.max_sessions);
    cfg.analysis.concurrency = env_or_usize("FACETLENS_CONCURRENCY", cfg.analysis.concurrency);
    cfg.analysis.output = env_or_string("FACETLENS_OUTPUT", &cfg.analysis.output);
    cfg.model.provider = env_or_optional("FACETLENS_PROVIDER", cfg.model.provider.take());
    cfg.model.model = env_or_optional("FACETLENS_MODEL", cfg.model.model.take());
    cfg.model.base_url = env_or_optional("FACETLENS_BASE_URL", cfg.model.base_url.take());
    cfg.model.retry_base_delay_ms =
        env_or_u64("FACETLENS_RETRY_BASE_MS", cfg.model.retry_base_delay_ms);
    cfg.model.request_timeout_secs =
        env_or_u64("FACETLENS_REQUEST_TIMEOUT_SECS", cfg.model.request_timeout_secs);
}

pub fn load_config() -> Result<LensConfig> {
    let mut cfg = LensConfig::default();
    merge_file_config(&mut cfg)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
