use tracing_subscriber::EnvFilter;

/// Install the global subscriber: `RUST_LOG` filtering (default `info`),
/// human-readable lines on stderr so stdout carries only JSON results.
pub(crate) fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
