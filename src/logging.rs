use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

const DEFAULT_FILTER: &str = "info,hf_hub=warn";

/// Installs a stderr log sink filtered by `RUST_LOG`. `log` records from the
/// library are forwarded into it. Safe to call more than once.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
