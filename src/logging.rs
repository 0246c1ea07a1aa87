//! tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` wins over `debug`. Calling this twice is harmless.
pub fn init_logging(debug: bool, format: LogFormat) {
    let default_filter = if debug { "postrun=debug" } else { "postrun=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
}
