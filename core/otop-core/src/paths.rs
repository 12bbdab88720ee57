//! Path management for the opencode files otop reads.
//!
//! Production code uses `StoragePaths::default()`, which follows the XDG
//! variables opencode itself honours. Tests point at temp files with
//! `StoragePaths::with_paths()`.

use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "opencode";
const DB_FILE: &str = "opencode.db";
const CONFIG_FILE: &str = "opencode.json";
const LOG_DIR_MARKER: &str = "opencode/log/";

/// Locations of opencode's database and global config.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    /// SQLite database (default: $XDG_DATA_HOME/opencode/opencode.db)
    db: PathBuf,
    /// Global config (default: $XDG_CONFIG_HOME/opencode/opencode.json)
    config: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self {
            db: xdg_home("XDG_DATA_HOME", &[".local", "share"])
                .join(APP_DIR)
                .join(DB_FILE),
            config: xdg_home("XDG_CONFIG_HOME", &[".config"])
                .join(APP_DIR)
                .join(CONFIG_FILE),
        }
    }
}

impl StoragePaths {
    /// Creates paths pointing at explicit files.
    /// Used for testing and for the CLI `--db` override.
    pub fn with_paths(db: PathBuf, config: PathBuf) -> Self {
        Self { db, config }
    }

    /// Replaces only the database path.
    pub fn with_db(mut self, db: PathBuf) -> Self {
        self.db = db;
        self
    }

    pub fn db(&self) -> &Path {
        &self.db
    }

    pub fn config(&self) -> &Path {
        &self.config
    }
}

/// Substring identifying opencode's log directory in an `lsof` NAME column.
pub fn log_dir_marker() -> &'static str {
    LOG_DIR_MARKER
}

fn xdg_home(var: &str, fallback: &[&str]) -> PathBuf {
    if let Some(value) = env::var_os(var).filter(|value| !value.is_empty()) {
        return PathBuf::from(value);
    }
    let mut base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    for part in fallback {
        base.push(part);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_paths_keeps_explicit_files() {
        let paths = StoragePaths::with_paths(
            PathBuf::from("/tmp/x/opencode.db"),
            PathBuf::from("/tmp/x/opencode.json"),
        );
        assert_eq!(paths.db(), Path::new("/tmp/x/opencode.db"));
        assert_eq!(paths.config(), Path::new("/tmp/x/opencode.json"));
    }

    #[test]
    fn with_db_overrides_only_database() {
        let paths = StoragePaths::with_paths(PathBuf::from("/a.db"), PathBuf::from("/a.json"))
            .with_db(PathBuf::from("/b.db"));
        assert_eq!(paths.db(), Path::new("/b.db"));
        assert_eq!(paths.config(), Path::new("/a.json"));
    }

    #[test]
    fn default_paths_end_with_opencode_files() {
        let paths = StoragePaths::default();
        assert!(paths.db().ends_with("opencode/opencode.db"));
        assert!(paths.config().ends_with("opencode/opencode.json"));
    }
}
