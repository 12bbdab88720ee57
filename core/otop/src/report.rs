//! Shapes a `FetchSnapshot` into the CLI's JSON and text outputs.

use chrono::{DateTime, Local};
use otop_core::{
    format_cost, format_duration, format_tokens, infer_status, short_model, short_path,
    AggregateStats, CorrelatedPair, FetchSnapshot, MessageDetail, SessionStatus, StatusThresholds,
};
use serde::Serialize;

/// One line of `otop sessions`.
#[derive(Debug, Serialize)]
pub struct SessionEntry {
    pub pid: u32,
    pub tty: String,
    pub cwd: Option<String>,
    pub cpu_percent: f64,
    pub mem_mb: f64,
    pub background: bool,
    pub tmux_pane: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub directory: String,
    pub model: Option<String>,
    pub agent: Option<String>,
    pub status: SessionStatus,
    pub message_count: i64,
    pub interactive: bool,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFilter {
    /// Keep background processes and processes without a session.
    pub include_all: bool,
    pub include_noninteractive: bool,
}

impl SessionFilter {
    fn keeps(&self, pair: &CorrelatedPair) -> bool {
        if !self.include_all && (pair.process.background || pair.session.is_none()) {
            return false;
        }
        if !self.include_noninteractive {
            if let Some(session) = &pair.session {
                return session.interactive;
            }
        }
        true
    }
}

pub fn session_entries(
    snapshot: &FetchSnapshot,
    thresholds: &StatusThresholds,
    filter: SessionFilter,
) -> Vec<SessionEntry> {
    let now_ms = snapshot.captured_at_ms();
    snapshot
        .pairs
        .iter()
        .filter(|pair| filter.keeps(pair))
        .map(|pair| {
            let process = &pair.process;
            SessionEntry {
                pid: process.pid,
                tty: process.tty.clone(),
                cwd: process.cwd.clone(),
                cpu_percent: process.cpu_percent,
                mem_mb: process.memory_mb,
                background: process.background,
                tmux_pane: process
                    .tmux
                    .as_ref()
                    .and_then(|pane| pane.target.clone()),
                session: pair.session.as_ref().map(|session| SessionSummary {
                    id: session.id.clone(),
                    title: session.title.clone(),
                    directory: session.directory.clone(),
                    model: session.model.clone(),
                    agent: session.agent.clone(),
                    status: infer_status(Some(session), process.cpu_percent, now_ms, thresholds),
                    message_count: session.message_count,
                    interactive: session.interactive,
                    total_cost: session.total_cost,
                }),
            }
        })
        .collect()
}

/// `otop snapshot`: the whole cycle plus a status per row.
#[derive(Debug, Serialize)]
pub struct SnapshotReport<'a> {
    pub captured_at: DateTime<chrono::Utc>,
    pub rows: Vec<SnapshotRow<'a>>,
    pub today: AggregateStats,
    pub global: AggregateStats,
    pub tool_providers: &'a Option<std::collections::BTreeMap<String, otop_core::ToolProviderEntry>>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotRow<'a> {
    pub status: SessionStatus,
    #[serde(flatten)]
    pub pair: &'a CorrelatedPair,
}

pub fn snapshot_report<'a>(
    snapshot: &'a FetchSnapshot,
    thresholds: &StatusThresholds,
) -> SnapshotReport<'a> {
    let now_ms = snapshot.captured_at_ms();
    SnapshotReport {
        captured_at: snapshot.captured_at,
        rows: snapshot
            .pairs
            .iter()
            .map(|pair| SnapshotRow {
                status: infer_status(
                    pair.session.as_ref(),
                    pair.process.cpu_percent,
                    now_ms,
                    thresholds,
                ),
                pair,
            })
            .collect(),
        today: snapshot.today,
        global: snapshot.global,
        tool_providers: &snapshot.tool_providers,
    }
}

const TABLE_HEADER: &str = "PID      STATUS      CPU%   MEM  UPTIME   ROUND    CTX     OUT     MODEL             TITLE";

/// Plain-text table for `otop watch`.
pub fn render_table(snapshot: &FetchSnapshot, thresholds: &StatusThresholds) -> String {
    let now_ms = snapshot.captured_at_ms();
    let mut lines = vec![TABLE_HEADER.to_string()];
    let mut working = 0usize;
    let mut shown = 0usize;

    for pair in snapshot.pairs.iter().filter(|pair| !pair.process.background) {
        let process = &pair.process;
        let status = infer_status(pair.session.as_ref(), process.cpu_percent, now_ms, thresholds);
        shown += 1;
        if status.is_working() {
            working += 1;
        }
        let uptime = process
            .uptime_ms(now_ms)
            .map(format_duration)
            .unwrap_or_else(|| "-".to_string());

        let line = match &pair.session {
            Some(session) => format!(
                "{:<8} {:<11} {:>5.1} {:>4.0}M {:<8} {:<8} {:<7} {:<7} {:<17} {}",
                process.pid,
                status.label(),
                process.cpu_percent,
                process.memory_mb,
                uptime,
                session
                    .round_ms(now_ms)
                    .map(format_duration)
                    .unwrap_or_else(|| "-".to_string()),
                format_tokens(session.total_input_tokens),
                format_tokens(session.total_output_tokens),
                short_model(session.model.as_deref()),
                session.title,
            ),
            None => format!(
                "{:<8} {:<11} {:>5.1} {:>4.0}M {:<8} {:<8} {:<7} {:<7} {:<17} {}",
                process.pid,
                "no-session",
                process.cpu_percent,
                process.memory_mb,
                uptime,
                "-",
                "-",
                "-",
                "-",
                short_path(process.cwd.as_deref().unwrap_or("?"), 40),
            ),
        };
        lines.push(line);
    }

    lines.push(String::new());
    lines.push(format!("{} working, {} running", working, shown));
    lines.push(format!(
        "today: {} sessions, {} msgs, {} in / {} out    all: {} sessions, {} msgs",
        snapshot.today.session_count,
        snapshot.today.message_count,
        format_tokens(snapshot.today.total_input),
        format_tokens(snapshot.today.total_output),
        snapshot.global.session_count,
        snapshot.global.message_count,
    ));
    if let Some(providers) = &snapshot.tool_providers {
        let enabled: Vec<&str> = providers
            .iter()
            .filter(|(_, entry)| entry.is_enabled())
            .map(|(name, _)| name.as_str())
            .collect();
        lines.push(format!("mcp: {}", enabled.join(", ")));
    }
    lines.join("\n")
}

/// One line per message for `otop messages`.
pub fn render_messages(messages: &[MessageDetail]) -> String {
    messages
        .iter()
        .map(|message| {
            let time = DateTime::from_timestamp_millis(message.created_at_ms)
                .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".to_string());
            let role = message
                .role
                .as_ref()
                .map(|role| role.as_str().to_string())
                .unwrap_or_else(|| "?".to_string());
            let preview = message
                .text_preview
                .as_deref()
                .map(|text| text.replace('\n', " "))
                .unwrap_or_default();
            format!(
                "{} {:<9} {:<16} {:>7} in {:>7} out  {}",
                time,
                role,
                short_model(message.model.as_deref()),
                format_tokens(message.tokens_in + message.cache_read),
                format_tokens(message.tokens_out),
                preview.trim(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary line for a session's spend, used by `otop messages`.
pub fn cost_line(total_cost: f64, total_input: i64, total_output: i64) -> String {
    format!(
        "cost {}  ctx {}  out {}",
        format_cost(total_cost),
        format_tokens(total_input),
        format_tokens(total_output)
    )
}
