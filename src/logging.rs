use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn filter_directives(own: Option<String>, rust_log: Option<String>) -> String {
    own.or(rust_log)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
pub fn init() {
    let directives = filter_directives(
        std::env::var("STATIONPACK_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
