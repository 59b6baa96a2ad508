//! Tracing subscriber setup for the `idgate` binary.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber filtered at `level`.
///
/// A valid `RUST_LOG` takes precedence over `level`. Calling this twice is a
/// no-op.
pub fn init_tracing(level: &str) {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), level);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

fn log_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level))
}
