use std::fs::OpenOptions;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter directives, e.g. `OUTBOX_LOG=outbox_core=debug`
pub const LOG_ENV: &str = "OUTBOX_LOG";
/// Also append debug-level logs to this file
pub const LOG_FILE_ENV: &str = "OUTBOX_LOG_FILE";

/// Install the global subscriber. Logs go to stderr so stdout stays valid JSON.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    if let Ok(log_path) = std::env::var(LOG_FILE_ENV) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file: {}", log_path))?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        registry.with(file_layer).try_init()?;
    } else {
        registry.try_init()?;
    }
    Ok(())
}
