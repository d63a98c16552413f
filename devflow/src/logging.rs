//! Diagnostic tracing for the runner.
//!
//! Tracing output is for debugging devflow itself and goes to stderr. Messages
//! meant for the user (prompts, step banners, outcomes) go through
//! [`crate::io::console`] instead and are not affected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset, which keeps tolerated
/// failures (checkout, pull, commit) visible.
///
/// # Example
/// ```bash
/// RUST_LOG=devflow=debug devflow run --profile pro-features
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
