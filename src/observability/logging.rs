//! Structured logging.
//!
//! Two layers: human-readable output on stdout and JSON lines in
//! `<log_dir>/<project>.log`. `debug = true` lowers the default level to
//! `debug`; `RUST_LOG` always wins.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise the global subscriber.
///
/// Returns the log file path. A second call leaves the first subscriber in
/// place.
pub fn init_logging(project: &str, debug: bool, log_dir: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file_name(project));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(debug))
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init();

    match installed {
        Ok(()) => tracing::info!(path = %path.display(), level = default_level, "Logging initialised"),
        Err(_) => tracing::debug!("Logging already initialised"),
    }
    Ok(path)
}

fn log_file_name(project: &str) -> String {
    let project = project.trim();
    if project.is_empty() {
        "service.log".to_string()
    } else {
        format!("{}.log", project)
    }
}
