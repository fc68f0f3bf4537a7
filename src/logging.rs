//! Tracing setup for the server binary.
//!
//! Events go to stdout and to `Config::log_path`, which defaults to `logs/docsift.log` under the
//! data directory so uploads, metadata, and logs share one root. The file layer writes through
//! a non-blocking appender.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the stdout and file layers. `RUST_LOG` filters both, defaulting to `info`.
pub fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let log_path = config.log_path();
    match file_writer(&log_path) {
        Ok(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
            tracing::debug!(path = %log_path.display(), "File logging enabled");
        }
        Err(err) => {
            registry.init();
            tracing::warn!(path = %log_path.display(), error = %err, "File logging disabled");
        }
    }
}

fn file_writer(path: &Path) -> std::io::Result<NonBlocking> {
    let (directory, file_name) = split_log_path(path)?;
    std::fs::create_dir_all(&directory)?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(non_blocking)
}

/// Directory and file name for the appender; a bare file name logs to the working directory.
fn split_log_path(path: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log path {} has no file name", path.display()),
        )
    })?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, PathBuf::from(file_name)))
}
