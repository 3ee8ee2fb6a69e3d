//! Logging setup

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Targets only shown with `--debug-http`
const HTTP_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "h2"];

/// Install the global subscriber
///
/// `level` applies to everything except the HTTP client internals, which stay
/// at `warn` unless `debug_http` is set. `RUST_LOG` directives are appended
/// last so they can still override both.
pub fn init(level: &str, debug_http: bool) -> Result<()> {
    let filter = EnvFilter::try_new(filter_directives(level, debug_http))
        .with_context(|| format!("invalid log level {:?}", level))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn filter_directives(level: &str, debug_http: bool) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" => "error".to_string(),
        other => other.to_string(),
    };
    let http_level = if debug_http { "debug" } else { "warn" };

    let mut directives = vec![level, format!("sqlx={}", http_level)];
    directives.extend(HTTP_TARGETS.iter().map(|t| format!("{}={}", t, http_level)));
    if let Ok(extra) = std::env::var("RUST_LOG") {
        directives.push(extra);
    }
    directives.join(",")
}
