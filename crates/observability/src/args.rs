//! CLI arguments for logging and metrics.

use std::{net::SocketAddr, path::PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};

/// Verbosity for the `duet` target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

/// Logging CLI arguments.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Logging")]
#[serde(default)]
pub struct LoggingArgs {
    /// Log level for duet crates (overridden by RUST_LOG)
    #[arg(long = "log.level", value_enum, default_value_t = LogLevel::Info)]
    pub level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long = "log.json")]
    pub json: bool,

    /// Disable ANSI colors on stdout
    #[arg(long = "log.no-color")]
    pub no_color: bool,

    /// Also append logs to this file
    #[arg(long = "log.file", value_name = "PATH")]
    pub file: Option<PathBuf>,
}

/// Metrics CLI arguments.
#[derive(Debug, Args, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Metrics")]
#[serde(default)]
pub struct MetricsArgs {
    /// Serve Prometheus metrics on this address
    #[arg(long = "metrics.addr", value_name = "ADDR")]
    pub addr: Option<SocketAddr>,
}
