//! Subscriber setup: stdout in json or pretty form, plus an optional daily log file

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "taskq=info";
const LOG_FILE_PREFIX: &str = "taskq-daemon.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the process logs.
pub fn init(log_format: &str, log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    match log_format {
        // Production: JSON structured logging
        "json" => registry
            .with(fmt::layer().json())
            .try_init()
            .context("Failed to install subscriber")?,
        // Development: Pretty formatting with colors
        _ => registry
            .with(fmt::layer().pretty())
            .try_init()
            .context("Failed to install subscriber")?,
    }

    Ok(guard)
}
