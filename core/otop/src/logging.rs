//! File logging for the CLI.
//!
//! stdout carries JSON for scripts, so diagnostics go to a daily rolling file
//! under `~/.local/state/otop/logs`. If that directory cannot be created the
//! subscriber writes to stderr instead.

use std::env;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "otop.log";

/// Installs the global subscriber. Keep the guard alive for the life of the
/// process or buffered lines are lost on exit.
pub fn init() -> Option<WorkerGuard> {
    let filter = env_filter(env::var("OTOP_DEBUG_LOG").ok().as_deref());

    match prepare_log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

fn env_filter(debug_flag: Option<&str>) -> EnvFilter {
    if debug_enabled(debug_flag) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}

fn prepare_log_dir() -> Option<PathBuf> {
    let dir = log_dir()?;
    fs_err::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn log_dir() -> Option<PathBuf> {
    let state_home = env::var_os("XDG_STATE_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))?;
    Some(state_home.join("otop").join("logs"))
}
