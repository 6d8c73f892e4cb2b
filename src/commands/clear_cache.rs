use anyhow::Result;

use crate::commands::CommandReport;
use crate::lens::audit;
use crate::lens::cache::FacetCache;
use crate::lens::paths::resolve_paths;

pub async fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("clear-cache");

    let cache = FacetCache::new(&paths.facets_dir);
    let removed = cache.clear().await?;
    tracing::info!(removed, dir = %paths.facets_dir.display(), "facet cache cleared");

    if let Err(err) = audit::append_event(
        &paths,
        "clear-cache",
        "ok",
        &format!("removed={removed}"),
    ) {
        tracing::warn!(error = %format!("{err:#}"), "audit log append failed");
    }

    report.detail(format!("facets_dir={}", paths.facets_dir.display()));
    report.detail(format!("removed_entries={removed}"));
    Ok(report)
}
