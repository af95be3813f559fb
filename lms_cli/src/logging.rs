//! Logging configuration.
//!
//! Log output goes to stderr so that JSON printed on stdout stays pipeable.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "warn,lms_client=info,lms_cli=info";

/// Initialize logging with levels from `RUST_LOG`
///
/// `verbose` raises the client library to `debug`, which shows every
/// passthrough and renewal decision.
///
/// # Example
///
/// ```no_run
/// use lms_cli::logging;
///
/// logging::init(false);
/// tracing::info!("Client starting");
/// ```
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose)));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn filter_directives(verbose: bool) -> String {
    if verbose {
        format!("{DEFAULT_FILTER},lms_client=debug")
    } else {
        DEFAULT_FILTER.to_string()
    }
}

/// Log a finished API call
pub fn log_api_call(command: &str, duration_ms: u64, ok: bool) {
    if ok {
        tracing::debug!(command = command, duration_ms = duration_ms, "API call completed");
    } else {
        tracing::warn!(command = command, duration_ms = duration_ms, "API call failed");
    }
}
