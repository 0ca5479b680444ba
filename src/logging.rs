//! Logging setup.

use tracing_subscriber::EnvFilter;

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "warn,slack_backfill=debug"
    } else {
        "warn,slack_backfill=info"
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at info, or at debug
/// with `--debug`.
pub fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
