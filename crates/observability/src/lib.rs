//! Logging and metrics bootstrap for Duet processes.
//!
//! Libraries in the workspace only emit through the `tracing` and `metrics`
//! facades. Binaries and test harnesses call [`initialize_logging`] and
//! optionally [`install_prometheus_exporter`] once at startup.

mod args;
mod logging;
mod prometheus;

pub use args::{LogLevel, LoggingArgs, MetricsArgs};
pub use logging::{env_filter_directive, initialize_logging};
pub use prometheus::{install_prometheus_exporter, install_prometheus_recorder};

/// Re-export metrics crate for convenience
pub use metrics;
