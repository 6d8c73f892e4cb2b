use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LensPaths {
    pub facetlens_home: PathBuf,
    pub facets_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub sessions_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<LensPaths> {
    let home = required_home_dir()?;
    let facetlens_home = env_or_default_path("FACETLENS_HOME", home.join(".facetlens"));

    let facets_dir = env_or_default_path("FACETLENS_FACETS_DIR", facetlens_home.join("facets"));
    let logs_dir = env_or_default_path("FACETLENS_LOGS_DIR", facetlens_home.join("logs"));
    let sessions_dir =
        env_or_default_path("FACETLENS_SESSIONS_DIR", home.join(".claude/projects"));

    Ok(LensPaths {
        facetlens_home,
        facets_dir,
        logs_dir,
        sessions_dir,
    })
}
