/// Tracing subscriber setup
///
/// Events go to a daily log file under `<config_dir>/logs` so the TUI screen
/// stays clean. `verbose` adds a stderr layer for one-shot commands.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::{AppConfig, APP_NAME, LOG_FILTER_ENV};

const DEFAULT_FILTER: &str = "lgd_cli=info";

pub fn log_dir() -> Result<PathBuf> {
    Ok(AppConfig::config_dir()?.join("logs"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the program.
pub fn init_logging(verbose: bool) -> Result<WorkerGuard> {
    let dir = log_dir()?;
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(&dir, format!("{}.log", APP_NAME));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(log_dir = %dir.display(), "logging initialized");
    Ok(guard)
}
