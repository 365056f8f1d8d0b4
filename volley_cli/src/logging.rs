//! Console + file tracing setup.

use std::path::Path;

use eyre::{Result, WrapErr};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use volley_config::Logging;

use crate::cli::FILE_GUARD;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `level_override`, which wins over `logging.level`.
/// Relative log files are placed under `base`.
pub fn init(cfg: &Logging, base: &Path, level_override: Option<&str>, json: bool) -> Result<()> {
    let level = level_override
        .or(cfg.level.as_deref())
        .unwrap_or("info");
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| eyre::eyre!("invalid log level {level:?}: {e}"))?,
    };

    let json_layer = json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let pretty_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = match cfg.file.as_deref() {
        Some(file) => {
            let path = base.join(file);
            let dir = path.parent().unwrap_or(base).to_path_buf();
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?
                .to_string();
            let rotation = match cfg.rotation.as_deref() {
                Some("daily") => Rotation::DAILY,
                Some("hourly") => Rotation::HOURLY,
                _ => Rotation::NEVER,
            };
            let appender = RollingFileAppender::builder()
                .rotation(rotation)
                .filename_prefix(name)
                .build(&dir)
                .wrap_err_with(|| format!("open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            if let Ok(mut slot) = FILE_GUARD.lock() {
                *slot = Some(guard);
            }
            Some(fmt::layer().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("tracing init failed: {e}"))
}

/// Flush and close the file writer.
pub fn flush() {
    if let Ok(mut slot) = FILE_GUARD.lock() {
        slot.take();
    }
}
