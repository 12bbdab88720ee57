use serde::Serialize;
use std::collections::HashMap;

/// `tmux list-panes -a -F` format: tty, session, window, addressable target.
pub const PANE_FORMAT: &str =
    "#{pane_tty}\t#{session_name}\t#{window_name}\t#{session_name}:#{window_index}.#{pane_index}";

/// Where a terminal lives inside tmux.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneBinding {
    pub session: String,
    pub window: Option<String>,
    /// `session:window.pane`, usable with `tmux capture-pane -t`.
    pub target: Option<String>,
}

pub fn pane_listing_args() -> Vec<String> {
    ["list-panes", "-a", "-F", PANE_FORMAT]
        .iter()
        .map(|value| value.to_string())
        .collect()
}

/// `ps` reports `ttys005` / `pts/3`; tmux reports `/dev/ttys005`.
pub fn normalize_tty(tty: &str) -> &str {
    tty.strip_prefix("/dev/").unwrap_or(tty)
}

/// Maps normalized tty names to their pane binding. Lines without a tty or
/// session name are ignored.
pub fn parse_tmux_panes(output: &str) -> HashMap<String, PaneBinding> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let tty = parts
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())?;
            let session = parts
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())?;
            let window = parts
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            let target = parts
                .next()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            Some((
                normalize_tty(tty).to_string(),
                PaneBinding {
                    session: session.to_string(),
                    window,
                    target,
                },
            ))
        })
        .collect()
}
