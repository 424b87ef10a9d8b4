use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

pub const LOG_FILE_PREFIX: &str = "topicgraph.log";

/// Install the global subscriber.
///
/// - `log_level` is an `EnvFilter` directive (e.g. `"info"` or `"topicgraph=debug"`).
/// - stderr gets a human-readable layer with thread names, so callbacks run
///   by a `ParallelAgent` worker show which worker delivered them.
/// - with `log_dir`, an ANSI-free daily rolling file is written there as well.
///
/// Returns `false` if a subscriber was already installed; the call is then a no-op.
pub fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> bool {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_thread_names(true)
    });

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}
