//! Tunable constants for scanning, correlation and status inference.
//!
//! Every field has a default so a partial settings file only overrides what
//! it names. The CLI loads these from TOML; the core never reads files here.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Tunables {
    #[serde(default)]
    pub status: StatusThresholds,
    #[serde(default)]
    pub correlation: CorrelationTunables,
    #[serde(default)]
    pub scanner: ScannerTunables,
    #[serde(default)]
    pub fetch: FetchTunables,
}

impl Tunables {
    /// Deadline shared by the units of a fetch cycle. Unless overridden it
    /// spans the correlation unit's sequential work: the `ps`, `lsof` and
    /// `tmux` timeouts plus one store busy timeout for the session reads.
    pub fn unit_timeout(&self) -> Duration {
        match self.fetch.unit_timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => {
                self.scanner.ps_timeout()
                    + self.scanner.lsof_timeout()
                    + self.scanner.tmux_timeout()
                    + self.fetch.store_busy_timeout()
            }
        }
    }
}

/// Age and CPU thresholds used by status inference.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusThresholds {
    /// An unfinished assistant message younger than this is still generating.
    #[serde(default = "default_generating_secs")]
    pub generating_secs: f64,
    /// A `tool-calls` message younger than this is still in tool use.
    #[serde(default = "default_tool_use_secs")]
    pub tool_use_secs: f64,
    /// A user message younger than this is still being picked up.
    #[serde(default = "default_user_wait_secs")]
    pub user_wait_secs: f64,
    /// CPU above this percentage counts as live activity.
    #[serde(default = "default_cpu_active_percent")]
    pub cpu_active_percent: f64,
}

impl Default for StatusThresholds {
    fn default() -> Self {
        Self {
            generating_secs: default_generating_secs(),
            tool_use_secs: default_tool_use_secs(),
            user_wait_secs: default_user_wait_secs(),
            cpu_active_percent: default_cpu_active_percent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationTunables {
    /// Candidate sessions considered per tier.
    #[serde(default = "default_candidate_window")]
    pub candidate_window: usize,
}

impl Default for CorrelationTunables {
    fn default() -> Self {
        Self {
            candidate_window: default_candidate_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerTunables {
    /// argv[0] basename of the monitored application.
    #[serde(default = "default_binary_name")]
    pub binary_name: String,
    /// Second argv tokens that mark a background/tool-wrapper instance.
    #[serde(default = "default_background_keywords")]
    pub background_keywords: Vec<String>,
    /// Whole command-line tokens (compared by basename) that identify the
    /// observer or filter artifacts.
    #[serde(default = "default_excluded_markers")]
    pub excluded_markers: Vec<String>,
    #[serde(default = "default_ps_timeout_ms")]
    pub ps_timeout_ms: u64,
    #[serde(default = "default_lsof_timeout_ms")]
    pub lsof_timeout_ms: u64,
    #[serde(default = "default_tmux_timeout_ms")]
    pub tmux_timeout_ms: u64,
}

impl Default for ScannerTunables {
    fn default() -> Self {
        Self {
            binary_name: default_binary_name(),
            background_keywords: default_background_keywords(),
            excluded_markers: default_excluded_markers(),
            ps_timeout_ms: default_ps_timeout_ms(),
            lsof_timeout_ms: default_lsof_timeout_ms(),
            tmux_timeout_ms: default_tmux_timeout_ms(),
        }
    }
}

impl ScannerTunables {
    pub fn ps_timeout(&self) -> Duration {
        Duration::from_millis(self.ps_timeout_ms)
    }

    pub fn lsof_timeout(&self) -> Duration {
        Duration::from_millis(self.lsof_timeout_ms)
    }

    pub fn tmux_timeout(&self) -> Duration {
        Duration::from_millis(self.tmux_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchTunables {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Explicit unit deadline. Unset derives it from the scanner timeouts,
    /// see [`Tunables::unit_timeout`].
    #[serde(default)]
    pub unit_timeout_ms: Option<u64>,
    #[serde(default = "default_store_busy_timeout_ms")]
    pub store_busy_timeout_ms: u64,
}

impl Default for FetchTunables {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            unit_timeout_ms: None,
            store_busy_timeout_ms: default_store_busy_timeout_ms(),
        }
    }
}

impl FetchTunables {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn store_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }
}

fn default_generating_secs() -> f64 {
    120.0
}

fn default_tool_use_secs() -> f64 {
    30.0
}

fn default_user_wait_secs() -> f64 {
    60.0
}

fn default_cpu_active_percent() -> f64 {
    5.0
}

fn default_candidate_window() -> usize {
    5
}

fn default_binary_name() -> String {
    "opencode".to_string()
}

fn default_background_keywords() -> Vec<String> {
    vec!["run".to_string()]
}

fn default_excluded_markers() -> Vec<String> {
    vec![
        "opencode-htop".to_string(),
        "otop".to_string(),
        "grep".to_string(),
    ]
}

fn default_ps_timeout_ms() -> u64 {
    5_000
}

fn default_lsof_timeout_ms() -> u64 {
    5_000
}

fn default_tmux_timeout_ms() -> u64 {
    2_000
}

fn default_refresh_interval_ms() -> u64 {
    2_000
}

fn default_store_busy_timeout_ms() -> u64 {
    2_000
}
