use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for the bot.
///
/// `RUST_LOG` wins when set. Otherwise `level` (from `LOG_LEVEL`) applies to
/// our crates and dependencies stay at `warn`.
pub fn init(service_name: &str, level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name, level)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install log subscriber: {e}")))
}

fn default_directives(service_name: &str, level: &str) -> String {
    let level = normalize_level(level);
    format!(
        "warn,{service_name}={level},grb_core={level},grb_openrouter={level},grb_telegram={level}"
    )
}

/// Map `LOG_LEVEL` spellings (`INFO`, `warning`, ...) to tracing levels.
fn normalize_level(raw: &str) -> &'static str {
    match raw.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        _ => "info",
    }
}
