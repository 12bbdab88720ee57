//! Status label for a process/session row.
//!
//! The committed `finish` field is authoritative once the store has it. Live
//! CPU is the secondary signal that catches a response still streaming before
//! it is flushed to the database.

use serde::Serialize;
use std::fmt;

use crate::store::{Finish, MessageRole, SessionRecord};
use crate::tunables::StatusThresholds;

/// Age used when the latest message time is unknown.
const UNKNOWN_AGE_SECS: f64 = 9999.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionStatus {
    #[serde(rename = "unknown")]
    Unknown,
    #[serde(rename = "generating")]
    Generating,
    #[serde(rename = "busy")]
    Busy,
    #[serde(rename = "stale")]
    Stale,
    #[serde(rename = "tool use")]
    ToolUse,
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "truncated")]
    Truncated,
    #[serde(rename = "thinking")]
    Thinking,
    #[serde(rename = "queued")]
    Queued,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Unknown => "unknown",
            SessionStatus::Generating => "generating",
            SessionStatus::Busy => "busy",
            SessionStatus::Stale => "stale",
            SessionStatus::ToolUse => "tool use",
            SessionStatus::Idle => "idle",
            SessionStatus::Truncated => "truncated",
            SessionStatus::Thinking => "thinking",
            SessionStatus::Queued => "queued",
        }
    }

    /// Whether the model is (probably) producing output right now.
    pub fn is_working(self) -> bool {
        matches!(
            self,
            SessionStatus::Generating | SessionStatus::Busy | SessionStatus::ToolUse
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Derives the status of a row from its session (if correlated) and the
/// process's current CPU usage. Pure; recompute whenever inputs change.
pub fn infer_status(
    session: Option<&SessionRecord>,
    cpu_percent: f64,
    now_ms: i64,
    thresholds: &StatusThresholds,
) -> SessionStatus {
    let Some(session) = session else {
        return SessionStatus::Unknown;
    };
    let age_secs = session
        .last_message_at_ms
        .map(|at| (now_ms - at) as f64 / 1000.0)
        .unwrap_or(UNKNOWN_AGE_SECS);

    classify(
        session.last_role.as_ref(),
        &session.last_finish,
        age_secs,
        cpu_percent,
        thresholds,
    )
}

/// The decision table behind [`infer_status`].
pub fn classify(
    role: Option<&MessageRole>,
    finish: &Finish,
    age_secs: f64,
    cpu_percent: f64,
    thresholds: &StatusThresholds,
) -> SessionStatus {
    let cpu_active = cpu_percent > thresholds.cpu_active_percent;
    let busy_or = |fallback| {
        if cpu_active {
            SessionStatus::Busy
        } else {
            fallback
        }
    };

    match role {
        Some(MessageRole::Assistant) => match finish {
            Finish::Unknown | Finish::InProgress => {
                if age_secs < thresholds.generating_secs {
                    SessionStatus::Generating
                } else {
                    busy_or(SessionStatus::Stale)
                }
            }
            Finish::Reason(reason) => match reason.as_str() {
                "tool-calls" if age_secs < thresholds.tool_use_secs => SessionStatus::ToolUse,
                "tool-calls" | "stop" => busy_or(SessionStatus::Idle),
                "length" => SessionStatus::Truncated,
                _ => SessionStatus::Idle,
            },
        },
        Some(MessageRole::User) => {
            if cpu_active || age_secs < thresholds.user_wait_secs {
                SessionStatus::Thinking
            } else {
                SessionStatus::Queued
            }
        }
        Some(MessageRole::Other(_)) | None => SessionStatus::Unknown,
    }
}
