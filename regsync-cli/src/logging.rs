//! Tracing setup: console output plus an optional daily-rolling log file.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogSettings;

const LOG_FILE_PREFIX: &str = "regsync.log";

/// Installs the global subscriber. The returned guard has to stay alive
/// for the life of the process, otherwise buffered file output is lost.
pub fn init(settings: &LogSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "regsync={level},regsync_core={level},regsync_cli={level}",
            level = settings.level
        ))
    });

    // File output is always JSON lines; the console stays human readable
    // unless [log] json is set.
    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if settings.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Ok(guard)
}
