//! Optional `otop.toml` overriding the observer's tunables.
//!
//! ```toml
//! [status]
//! generating_secs = 180
//!
//! [correlation]
//! candidate_window = 8
//!
//! [fetch]
//! refresh_interval_ms = 1000
//! ```

use otop_core::Tunables;
use std::path::PathBuf;

const SETTINGS_DIR: &str = "otop";
const SETTINGS_FILE: &str = "otop.toml";

pub fn default_settings_path() -> Result<PathBuf, String> {
    let config_home = match std::env::var_os("XDG_CONFIG_HOME").filter(|value| !value.is_empty()) {
        Some(value) => PathBuf::from(value),
        None => dirs::home_dir()
            .ok_or_else(|| "Could not determine home directory".to_string())?
            .join(".config"),
    };
    Ok(config_home.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// Loads tunables from `path` (or the default location). A missing file means
/// defaults; a present but malformed one is an error.
pub fn load_settings(path: Option<PathBuf>) -> Result<Tunables, String> {
    let settings_path = match path {
        Some(path) => path,
        None => default_settings_path()?,
    };

    if !settings_path.exists() {
        return Ok(Tunables::default());
    }

    let content = fs_err::read_to_string(&settings_path).map_err(|err| {
        format!(
            "Failed to read otop settings {}: {}",
            settings_path.display(),
            err
        )
    })?;
    toml::from_str::<Tunables>(&content).map_err(|err| {
        format!(
            "Failed to parse otop settings {}: {}",
            settings_path.display(),
            err
        )
    })
}
