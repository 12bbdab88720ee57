//! Compiled regex patterns for parsing opencode command lines and log names.
//!
//! Update these when opencode changes its flag spelling or log naming.

use once_cell::sync::Lazy;
use regex::Regex;

/// `-s ses_xxx` or `--session ses_xxx` anywhere in the command line.
pub static RE_SESSION_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(?:-s|--session)\s+(ses_\S+)").unwrap());

/// Log filenames are UTC timestamps: `2026-02-20T145658.log`.
pub static RE_LOG_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})T(\d{2})(\d{2})(\d{2})\.log").unwrap());
