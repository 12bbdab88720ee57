//! Display helpers shared by the CLI views.

const MODEL_MAX_CHARS: usize = 16;

/// Longest match first: dated ids before their undated prefixes.
const MODEL_ABBREVIATIONS: &[(&str, &str)] = &[
    ("claude-opus-4-5-20251101", "opus-4.5"),
    ("claude-sonnet-4-5-20250929", "sonnet-4.5"),
    ("claude-opus-4-6", "opus-4.6"),
    ("claude-sonnet-4-6", "sonnet-4.6"),
    ("claude-opus-4-5", "opus-4.5"),
    ("claude-sonnet-4-5", "sonnet-4.5"),
    ("gpt-5.2-codex", "gpt-5.2"),
    ("gpt-4o-mini", "4o-mini"),
    ("antigravity-", "ag/"),
    ("gemini-3-pro", "gem-3p"),
    ("gemini-3-flash", "gem-3f"),
];

/// `950`, `12.3K`, `4.1M`.
pub fn format_tokens(count: i64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Compact elapsed time: `42s`, `3m07s`, `2h05m`, `3d4h`. Non-positive is `-`.
pub fn format_duration(ms: i64) -> String {
    if ms <= 0 {
        return "-".to_string();
    }
    let secs = ms / 1000;
    if secs < 60 {
        return format!("{}s", secs);
    }
    let (mins, secs) = (secs / 60, secs % 60);
    if mins < 60 {
        return format!("{}m{:02}s", mins, secs);
    }
    let (hours, mins) = (mins / 60, mins % 60);
    if hours < 24 {
        return format!("{}h{:02}m", hours, mins);
    }
    format!("{}d{}h", hours / 24, hours % 24)
}

pub fn format_cost(cost: f64) -> String {
    if cost <= 0.0 {
        "-".to_string()
    } else if cost < 0.01 {
        "<$0.01".to_string()
    } else {
        format!("${:.2}", cost)
    }
}

/// Abbreviates well-known model ids and caps the result at 16 characters.
pub fn short_model(model: Option<&str>) -> String {
    let Some(model) = model.filter(|value| !value.is_empty() && *value != "?") else {
        return "?".to_string();
    };
    let mut short = model.to_string();
    for (long, abbreviated) in MODEL_ABBREVIATIONS {
        short = short.replacen(long, abbreviated, 1);
    }
    short.chars().take(MODEL_MAX_CHARS).collect()
}

/// Replaces the home prefix with `~` and keeps the tail when too long.
pub fn short_path(path: &str, max_chars: usize) -> String {
    let home = dirs::home_dir().map(|home| home.to_string_lossy().into_owned());
    shorten_path(path, home.as_deref(), max_chars)
}

fn shorten_path(path: &str, home: Option<&str>, max_chars: usize) -> String {
    let display = match home.filter(|home| !home.is_empty()) {
        Some(home) if path == home || path.starts_with(&format!("{}/", home)) => {
            format!("~{}", &path[home.len()..])
        }
        _ => path.to_string(),
    };

    let count = display.chars().count();
    if count <= max_chars || max_chars <= 3 {
        return display;
    }
    let tail: String = display.chars().skip(count - (max_chars - 3)).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_use_k_and_m_suffixes() {
        assert_eq!(format_tokens(0), "0");
        assert_eq!(format_tokens(999), "999");
        assert_eq!(format_tokens(1_000), "1.0K");
        assert_eq!(format_tokens(12_345), "12.3K");
        assert_eq!(format_tokens(4_160_000), "4.2M");
    }

    #[test]
    fn durations_pick_two_units() {
        assert_eq!(format_duration(0), "-");
        assert_eq!(format_duration(-5), "-");
        assert_eq!(format_duration(42_000), "42s");
        assert_eq!(format_duration(187_000), "3m07s");
        assert_eq!(format_duration(7_500_000), "2h05m");
        assert_eq!(format_duration(100 * 3_600_000), "4d4h");
    }

    #[test]
    fn cost_formatting() {
        assert_eq!(format_cost(0.0), "-");
        assert_eq!(format_cost(0.004), "<$0.01");
        assert_eq!(format_cost(1.234), "$1.23");
    }

    #[test]
    fn short_model_abbreviates_and_truncates() {
        assert_eq!(short_model(Some("claude-opus-4-5-20251101")), "opus-4.5");
        assert_eq!(short_model(Some("claude-sonnet-4-6")), "sonnet-4.6");
        assert_eq!(short_model(Some("antigravity-gemini-3-pro")), "ag/gem-3p");
        assert_eq!(short_model(Some("some-very-long-model-name-v2")), "some-very-long-m");
        assert_eq!(short_model(Some("")), "?");
        assert_eq!(short_model(None), "?");
    }

    #[test]
    fn paths_collapse_home_and_keep_tail() {
        assert_eq!(shorten_path("/home/me/code/app", Some("/home/me"), 40), "~/code/app");
        assert_eq!(shorten_path("/home/meadow/x", Some("/home/me"), 40), "/home/meadow/x");
        assert_eq!(
            shorten_path("/srv/projects/really/deep/tree", None, 12),
            "...deep/tree"
        );
    }
}
