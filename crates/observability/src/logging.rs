//! Logging system for Duet

use std::{fs::File, path::Path, sync::Arc};

use eyre::Context;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{LogLevel, LoggingArgs};

/// Default filter when `RUST_LOG` is unset.
pub fn env_filter_directive(level: LogLevel) -> String {
    format!("info,duet={level}")
}

/// Initialize the global logging system.
///
/// Fails if a global subscriber is already installed.
pub fn initialize_logging(args: &LoggingArgs) -> eyre::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_filter_directive(args.level)));

    let stdout_layer = fmt::Layer::new()
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(!args.no_color);

    let stdout_layer = if args.json {
        stdout_layer.json().boxed()
    } else {
        stdout_layer.boxed()
    };

    let file_layer = match &args.file {
        Some(path) => {
            let file = open_log_file(path)?;
            let layer = fmt::Layer::new()
                .with_span_events(FmtSpan::CLOSE)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            Some(if args.json {
                layer.json().boxed()
            } else {
                layer.boxed()
            })
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .context("Failed to install global subscriber")?;

    Ok(())
}

fn open_log_file(path: &Path) -> eyre::Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).context("Failed to create log directory")?;
    }

    File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
