//! Session-store DTOs. Rebuilt from the database every cycle; never cached.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Terminal state of the latest assistant message.
///
/// `Unknown` and `InProgress` are kept apart on purpose: a NULL column means
/// the store has nothing yet, an empty string means the message was committed
/// but has not finished.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Finish {
    #[default]
    Unknown,
    InProgress,
    Reason(String),
}

impl Finish {
    pub fn from_column(value: Option<String>) -> Self {
        match value {
            None => Finish::Unknown,
            Some(value) if value.is_empty() => Finish::InProgress,
            Some(value) => Finish::Reason(value),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Finish::Reason(reason) => Some(reason.as_str()),
            _ => None,
        }
    }
}

impl Serialize for Finish {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Finish::Unknown => serializer.serialize_none(),
            Finish::InProgress => serializer.serialize_str(""),
            Finish::Reason(reason) => serializer.serialize_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    Other(String),
}

impl MessageRole {
    pub fn parse(value: &str) -> Self {
        match value {
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            other => MessageRole::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Other(other) => other.as_str(),
        }
    }
}

impl Serialize for MessageRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(TodoStatus::Pending),
            "in_progress" => Ok(TodoStatus::InProgress),
            "completed" => Ok(TodoStatus::Completed),
            "cancelled" => Ok(TodoStatus::Cancelled),
            other => Err(format!("unknown todo status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoPriority {
    High,
    Medium,
    Low,
}

impl FromStr for TodoPriority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "high" => Ok(TodoPriority::High),
            "medium" => Ok(TodoPriority::Medium),
            "low" => Ok(TodoPriority::Low),
            other => Err(format!("unknown todo priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
    pub priority: TodoPriority,
}

/// One session with its message aggregates and latest-message state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub directory: String,
    pub project_id: Option<String>,
    pub version: Option<String>,
    /// False once opencode recorded a permission override for the session.
    pub interactive: bool,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    /// Every message with a valid payload, user and assistant alike. The
    /// token and cost totals below count assistant messages only.
    pub message_count: i64,
    /// Input plus cache-read tokens of assistant messages (context size).
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_cache_read: i64,
    pub total_cost: f64,
    pub model: Option<String>,
    pub agent: Option<String>,
    pub last_role: Option<MessageRole>,
    pub last_finish: Finish,
    pub last_message_at_ms: Option<i64>,
    /// Time of the most recent user message.
    pub round_started_at_ms: Option<i64>,
    /// Last non-blank line of the newest assistant text.
    pub last_output: Option<String>,
    pub todos: Vec<TodoItem>,
}

impl SessionRecord {
    pub fn round_ms(&self, now_ms: i64) -> Option<i64> {
        self.round_started_at_ms
            .map(|started| now_ms.saturating_sub(started))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    /// Sessions updated since UTC midnight.
    Today,
    Global,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub session_count: i64,
    pub message_count: i64,
    pub total_input: i64,
    pub total_output: i64,
}

/// A single message for a detail listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageDetail {
    pub role: Option<MessageRole>,
    pub finish: Finish,
    pub model: Option<String>,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cache_read: i64,
    pub created_at_ms: i64,
    pub text_preview: Option<String>,
}
