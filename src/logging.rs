//! tracing setup: terminal output plus a daily log file
//!
//! `RUST_LOG` overrides the built-in filter.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "sort_evo_viz.log";
const DEFAULT_FILTER: &str = "info,sort_evo_viz=debug";

/// Install the global subscriber. Dropping the guard flushes pending file
/// writes, so `main` keeps it alive until the process ends.
pub fn init_logging(log_dir: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(Path::new(log_dir))
        .with_context(|| format!("Cannot create log directory {}", log_dir))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Terminal gets color; the file gets thread ids instead
    let terminal = fmt::layer().with_target(true).with_file(true).with_line_number(true);
    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(terminal)
        .with(file)
        .try_init()
        .context("A tracing subscriber is already installed")?;

    tracing::debug!("Writing {}.<date> under {}", LOG_FILE_PREFIX, log_dir);
    Ok(guard)
}
