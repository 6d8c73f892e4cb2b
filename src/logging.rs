use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "facetlens=info";

fn resolve_filter(facetlens_log: Option<String>, rust_log: Option<String>) -> String {
    facetlens_log
        .or(rust_log)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the stderr subscriber. Stdout is reserved for command reports.
pub fn init() {
    let directives = resolve_filter(
        std::env::var("FACETLENS_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_FILTER, resolve_filter};

    #[test]
    fn facetlens_log_wins_over_rust_log() {
        let got = resolve_filter(Some("facetlens=debug".into()), Some("warn".into()));
        assert_eq!(got, "facetlens=debug");
    }

    #[test]
    fn blank_values_fall_back_to_default() {
        assert_eq!(resolve_filter(Some("  ".into()), None), DEFAULT_FILTER);
        assert_eq!(resolve_filter(None, None), DEFAULT_FILTER);
    }
}
