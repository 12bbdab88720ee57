//! Read-only access to opencode's SQLite store.
//!
//! opencode keeps writing in WAL mode while we read, so every operation opens
//! its own read-only connection and drops it when done. Public methods never
//! fail: a missing file, a locked database, or a bad row reads as "nothing".

mod provider_config;
mod types;

pub use provider_config::{read_tool_providers, ToolProviderEntry};
pub use types::{
    AggregateStats, Finish, MessageDetail, MessageRole, SessionRecord, StatsScope, TodoItem,
    TodoPriority, TodoStatus,
};

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OtopError, Result};

const UNTITLED: &str = "(untitled)";
const PREVIEW_CHARS: usize = 200;
const DAY_MS: i64 = 86_400_000;

/// Messages whose payload parses as JSON. Rows with corrupt payloads are
/// skipped rather than failing the whole aggregate.
const VALID_MESSAGES: &str =
    "(SELECT id, session_id, data, time_created FROM message WHERE json_valid(data))";

pub struct SessionStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SessionStore {
    pub fn new(path: PathBuf, busy_timeout: Duration) -> Self {
        Self { path, busy_timeout }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Full session record, or `None` when the session does not exist or the
    /// store cannot be read.
    pub fn get_session(&self, session_id: &str) -> Option<SessionRecord> {
        self.fold("get_session", || {
            self.with_connection(|conn| load_session(conn, session_id))
        })
        .flatten()
    }

    pub fn query_stats(&self, scope: StatsScope, now_ms: i64) -> AggregateStats {
        let since = match scope {
            StatsScope::Today => Some(utc_midnight_ms(now_ms)),
            StatsScope::Global => None,
        };
        self.fold("query_stats", || {
            self.with_connection(|conn| load_stats(conn, since))
        })
        .unwrap_or_default()
    }

    /// Sessions in `directory` with messages created at or after `since_ms`,
    /// busiest first.
    pub fn sessions_active_since(&self, directory: &str, since_ms: i64, limit: usize) -> Vec<String> {
        self.fold("sessions_active_since", || {
            self.with_connection(|conn| {
                let sql = "SELECT s.id, count(m.id) AS msgs_since, max(m.time_created) AS latest \
                           FROM session s \
                           JOIN message m ON m.session_id = s.id \
                           WHERE s.directory = ?1 AND m.time_created >= ?2 \
                           GROUP BY s.id \
                           ORDER BY msgs_since DESC, latest DESC, s.id ASC \
                           LIMIT ?3";
                collect_ids(conn, sql, params![directory, since_ms, limit as i64])
            })
        })
        .unwrap_or_default()
    }

    /// Sessions in `directory`, most recently updated first.
    pub fn recent_sessions_for_directory(&self, directory: &str, limit: usize) -> Vec<String> {
        self.fold("recent_sessions_for_directory", || {
            self.with_connection(|conn| {
                let sql = "SELECT id FROM session \
                           WHERE directory = ?1 \
                           ORDER BY time_updated DESC, id ASC \
                           LIMIT ?2";
                collect_ids(conn, sql, params![directory, limit as i64])
            })
        })
        .unwrap_or_default()
    }

    /// The newest `limit` messages of a session, oldest first.
    pub fn recent_messages(&self, session_id: &str, limit: usize) -> Vec<MessageDetail> {
        self.fold("recent_messages", || {
            self.with_connection(|conn| load_recent_messages(conn, session_id, limit))
        })
        .unwrap_or_default()
    }

    fn fold<T>(&self, operation: &str, op: impl FnOnce() -> Result<T>) -> Option<T> {
        match op() {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(
                    operation,
                    path = %self.path.display(),
                    error = %err,
                    "Session store read failed"
                );
                None
            }
        }
    }

    fn with_connection<T>(&self, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.open()?;
        op(&conn)
    }

    fn open(&self) -> Result<Connection> {
        let unreachable_err = |source| OtopError::StoreUnreachable {
            path: self.path.clone(),
            source,
        };

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags).map_err(unreachable_err)?;
        conn.busy_timeout(self.busy_timeout).map_err(unreachable_err)?;
        Ok(conn)
    }
}

/// Start of the UTC day containing `now_ms`.
pub fn utc_midnight_ms(now_ms: i64) -> i64 {
    now_ms - now_ms.rem_euclid(DAY_MS)
}

fn load_session(conn: &Connection, session_id: &str) -> Result<Option<SessionRecord>> {
    let sql = format!(
        "SELECT s.id, s.title, s.directory, s.project_id, s.version, \
                s.permission IS NOT NULL, \
                s.time_created, s.time_updated, \
                count(m.id), \
                sum(CASE WHEN json_extract(m.data, '$.role') = 'assistant' \
                    THEN coalesce(json_extract(m.data, '$.tokens.input'), 0) \
                       + coalesce(json_extract(m.data, '$.tokens.cache.read'), 0) \
                    ELSE 0 END), \
                sum(CASE WHEN json_extract(m.data, '$.role') = 'assistant' \
                    THEN coalesce(json_extract(m.data, '$.tokens.output'), 0) ELSE 0 END), \
                sum(CASE WHEN json_extract(m.data, '$.role') = 'assistant' \
                    THEN coalesce(json_extract(m.data, '$.tokens.cache.read'), 0) ELSE 0 END), \
                sum(CASE WHEN json_extract(m.data, '$.role') = 'assistant' \
                    THEN coalesce(json_extract(m.data, '$.cost'), 0) ELSE 0 END) \
         FROM session s \
         LEFT JOIN {VALID_MESSAGES} m ON m.session_id = s.id \
         WHERE s.id = ?1 \
         GROUP BY s.id"
    );

    let record = conn
        .query_row(&sql, params![session_id], |row| {
            let title = text_column(row, 1)?
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            Ok(SessionRecord {
                id: row.get(0)?,
                title,
                directory: text_column(row, 2)?.unwrap_or_default(),
                project_id: text_column(row, 3)?,
                version: text_column(row, 4)?,
                interactive: !row.get::<_, bool>(5)?,
                created_at_ms: int_column(row, 6)?,
                updated_at_ms: int_column(row, 7)?,
                message_count: int_column(row, 8)?,
                total_input_tokens: int_column(row, 9)?,
                total_output_tokens: int_column(row, 10)?,
                total_cache_read: int_column(row, 11)?,
                total_cost: real_column(row, 12)?,
                model: None,
                agent: None,
                last_role: None,
                last_finish: Finish::Unknown,
                last_message_at_ms: None,
                round_started_at_ms: None,
                last_output: None,
                todos: Vec::new(),
            })
        })
        .optional()
        .map_err(OtopError::query("session aggregate"))?;

    let Some(mut record) = record else {
        return Ok(None);
    };

    apply_latest_message(conn, &mut record)?;
    record.round_started_at_ms = round_start(conn, session_id)?;
    record.last_output = last_output(conn, session_id)?;
    record.todos = todos(conn, session_id)?;

    Ok(Some(record))
}

fn apply_latest_message(conn: &Connection, record: &mut SessionRecord) -> Result<()> {
    let sql = format!(
        "SELECT json_extract(data, '$.role'), json_extract(data, '$.finish'), \
                json_extract(data, '$.modelID'), json_extract(data, '$.agent'), \
                time_created \
         FROM {VALID_MESSAGES} \
         WHERE session_id = ?1 \
         ORDER BY time_created DESC \
         LIMIT 1"
    );

    let latest = conn
        .query_row(&sql, params![record.id], |row| {
            Ok((
                text_column(row, 0)?,
                text_column(row, 1)?,
                text_column(row, 2)?,
                text_column(row, 3)?,
                int_column(row, 4)?,
            ))
        })
        .optional()
        .map_err(OtopError::query("latest message"))?;

    if let Some((role, finish, model, agent, created)) = latest {
        record.last_role = role.as_deref().map(MessageRole::parse);
        record.last_finish = Finish::from_column(finish);
        record.model = model.filter(|value| !value.is_empty());
        record.agent = agent.filter(|value| !value.is_empty());
        record.last_message_at_ms = Some(created);
    }
    Ok(())
}

fn round_start(conn: &Connection, session_id: &str) -> Result<Option<i64>> {
    let sql = format!(
        "SELECT time_created FROM {VALID_MESSAGES} \
         WHERE session_id = ?1 AND json_extract(data, '$.role') = 'user' \
         ORDER BY time_created DESC \
         LIMIT 1"
    );
    conn.query_row(&sql, params![session_id], |row| int_column(row, 0))
        .optional()
        .map_err(OtopError::query("round start"))
}

fn last_output(conn: &Connection, session_id: &str) -> Result<Option<String>> {
    let sql = format!(
        "SELECT p.data \
         FROM part p \
         JOIN {VALID_MESSAGES} m ON p.message_id = m.id \
         WHERE p.session_id = ?1 \
           AND json_extract(m.data, '$.role') = 'assistant' \
           AND CASE WHEN json_valid(p.data) THEN json_extract(p.data, '$.type') END = 'text' \
         ORDER BY p.time_created DESC \
         LIMIT 1"
    );

    let data: Option<String> = conn
        .query_row(&sql, params![session_id], |row| text_column(row, 0))
        .optional()
        .map_err(OtopError::query("last output"))?
        .flatten();

    Ok(data
        .and_then(|data| part_text(&data))
        .and_then(|text| last_non_blank_line(&text)))
}

fn todos(conn: &Connection, session_id: &str) -> Result<Vec<TodoItem>> {
    let mut stmt = conn
        .prepare(
            "SELECT content, status, priority FROM todo \
             WHERE session_id = ?1 \
             ORDER BY position",
        )
        .map_err(OtopError::query("prepare todos"))?;

    let rows = stmt
        .query_map(params![session_id], |row| {
            Ok((text_column(row, 0)?, text_column(row, 1)?, text_column(row, 2)?))
        })
        .map_err(OtopError::query("read todos"))?;

    let mut items = Vec::new();
    for row in rows {
        let (content, status, priority) = row.map_err(OtopError::query("decode todo"))?;
        let parsed = status
            .as_deref()
            .unwrap_or_default()
            .parse::<TodoStatus>()
            .and_then(|status| {
                priority
                    .as_deref()
                    .unwrap_or_default()
                    .parse::<TodoPriority>()
                    .map(|priority| (status, priority))
            });
        match parsed {
            Ok((status, priority)) => items.push(TodoItem {
                content: content.unwrap_or_default(),
                status,
                priority,
            }),
            Err(details) => {
                tracing::debug!(session_id, %details, "Skipping todo record");
            }
        }
    }
    Ok(items)
}

fn load_stats(conn: &Connection, since_ms: Option<i64>) -> Result<AggregateStats> {
    let sql = format!(
        "SELECT count(DISTINCT s.id), count(m.id), \
                sum(CASE WHEN json_extract(m.data, '$.role') = 'assistant' \
                    THEN coalesce(json_extract(m.data, '$.tokens.input'), 0) \
                       + coalesce(json_extract(m.data, '$.tokens.cache.read'), 0) \
                    ELSE 0 END), \
                sum(CASE WHEN json_extract(m.data, '$.role') = 'assistant' \
                    THEN coalesce(json_extract(m.data, '$.tokens.output'), 0) ELSE 0 END) \
         FROM session s \
         LEFT JOIN {VALID_MESSAGES} m ON m.session_id = s.id \
         WHERE ?1 IS NULL OR s.time_updated > ?1"
    );

    conn.query_row(&sql, params![since_ms], |row| {
        Ok(AggregateStats {
            session_count: int_column(row, 0)?,
            message_count: int_column(row, 1)?,
            total_input: int_column(row, 2)?,
            total_output: int_column(row, 3)?,
        })
    })
    .map_err(OtopError::query("aggregate stats"))
}

fn load_recent_messages(
    conn: &Connection,
    session_id: &str,
    limit: usize,
) -> Result<Vec<MessageDetail>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, data, time_created FROM message \
             WHERE session_id = ?1 \
             ORDER BY time_created DESC \
             LIMIT ?2",
        )
        .map_err(OtopError::query("prepare recent messages"))?;

    let rows: Vec<(String, Option<String>, i64)> = stmt
        .query_map(params![session_id, limit as i64], |row| {
            Ok((row.get(0)?, text_column(row, 1)?, int_column(row, 2)?))
        })
        .map_err(OtopError::query("read recent messages"))?
        .collect::<rusqlite::Result<_>>()
        .map_err(OtopError::query("decode recent messages"))?;

    let mut messages = Vec::with_capacity(rows.len());
    for (message_id, data, created_at_ms) in rows {
        let payload = match parse_payload(&message_id, data.as_deref()) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(%message_id, error = %err, "Skipping message");
                continue;
            }
        };

        messages.push(MessageDetail {
            role: payload
                .get("role")
                .and_then(Value::as_str)
                .map(MessageRole::parse),
            finish: Finish::from_column(
                payload
                    .get("finish")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            model: payload
                .get("modelID")
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            tokens_in: json_int(&payload, "/tokens/input"),
            tokens_out: json_int(&payload, "/tokens/output"),
            cache_read: json_int(&payload, "/tokens/cache/read"),
            created_at_ms,
            text_preview: text_preview(conn, &message_id)?,
        });
    }

    messages.reverse();
    Ok(messages)
}

fn text_preview(conn: &Connection, message_id: &str) -> Result<Option<String>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM part \
             WHERE message_id = ?1 \
               AND CASE WHEN json_valid(data) THEN json_extract(data, '$.type') END = 'text' \
             ORDER BY time_created ASC \
             LIMIT 1",
            params![message_id],
            |row| text_column(row, 0),
        )
        .optional()
        .map_err(OtopError::query("message preview"))?
        .flatten();

    Ok(data
        .and_then(|data| part_text(&data))
        .map(|text| text.chars().take(PREVIEW_CHARS).collect()))
}

fn parse_payload(message_id: &str, data: Option<&str>) -> Result<Value> {
    let data = data.ok_or_else(|| OtopError::MalformedRecord {
        context: format!("message {}", message_id),
        details: "missing payload".to_string(),
    })?;
    serde_json::from_str(data).map_err(|err| OtopError::MalformedRecord {
        context: format!("message {}", message_id),
        details: err.to_string(),
    })
}

fn part_text(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    value.get("text")?.as_str().map(str::to_string)
}

fn last_non_blank_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn json_int(value: &Value, pointer: &str) -> i64 {
    value
        .pointer(pointer)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn collect_ids(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(OtopError::query("prepare candidate query"))?;
    let rows = stmt
        .query_map(args, |row| row.get::<_, String>(0))
        .map_err(OtopError::query("read candidate ids"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(OtopError::query("decode candidate ids"))
}

fn text_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
    })
}

fn int_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<i64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(value) => value,
        ValueRef::Real(value) => value as i64,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok())
            .map(|value| value as i64)
            .unwrap_or(0),
        ValueRef::Null | ValueRef::Blob(_) => 0,
    })
}

fn real_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(value) => value as f64,
        ValueRef::Real(value) => value,
        _ => 0.0,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::Fixture;
    use super::*;

    const NOW: i64 = 1_771_599_418_000;

    fn store_at(dir: &tempfile::TempDir) -> (SessionStore, Fixture) {
        let path = dir.path().join("opencode.db");
        let fixture = Fixture::create(&path);
        (SessionStore::new(path, Duration::from_millis(500)), fixture)
    }

    #[test]
    fn get_session_aggregates_assistant_tokens_and_latest_state() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);

        fx.session("ses_a", "/work/app", "Refactor", NOW - 1_000);
        fx.message("ses_a", NOW - 50_000, r#"{"role":"user"}"#);
        let assistant = fx.message(
            "ses_a",
            NOW - 40_000,
            r#"{"role":"assistant","finish":"stop","modelID":"claude-sonnet-4","agent":"build",
                "tokens":{"input":100,"output":40,"cache":{"read":1000}},"cost":0.25}"#,
        );
        fx.part("ses_a", &assistant, NOW - 39_000, r#"{"type":"text","text":"first\nDone.\n\n  "}"#);
        fx.part("ses_a", &assistant, NOW - 39_500, r#"{"type":"tool","tool":"bash"}"#);
        fx.message("ses_a", NOW - 10_000, r#"{"role":"user","tokens":{"input":999}}"#);
        fx.message(
            "ses_a",
            NOW - 5_000,
            r#"{"role":"assistant","finish":"","modelID":"claude-sonnet-4","agent":"build",
                "tokens":{"input":20,"output":2,"cache":{"read":30}},"cost":0.05}"#,
        );

        let record = store.get_session("ses_a").expect("session");
        assert_eq!(record.title, "Refactor");
        assert_eq!(record.directory, "/work/app");
        assert_eq!(record.project_id.as_deref(), Some("proj_1"));
        assert!(record.interactive);
        assert_eq!(record.message_count, 4);
        assert_eq!(record.total_input_tokens, 100 + 1000 + 20 + 30);
        assert_eq!(record.total_output_tokens, 42);
        assert_eq!(record.total_cache_read, 1030);
        assert!((record.total_cost - 0.30).abs() < 1e-9);
        assert_eq!(record.last_role, Some(MessageRole::Assistant));
        assert_eq!(record.last_finish, Finish::InProgress);
        assert_eq!(record.model.as_deref(), Some("claude-sonnet-4"));
        assert_eq!(record.agent.as_deref(), Some("build"));
        assert_eq!(record.last_message_at_ms, Some(NOW - 5_000));
        assert_eq!(record.round_started_at_ms, Some(NOW - 10_000));
        assert_eq!(record.round_ms(NOW), Some(10_000));
        assert_eq!(record.last_output.as_deref(), Some("Done."));
    }

    #[test]
    fn get_session_without_messages_has_unknown_finish() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_empty", "/work", "  ", NOW);
        fx.non_interactive("ses_empty");

        let record = store.get_session("ses_empty").expect("session");
        assert_eq!(record.title, "(untitled)");
        assert!(!record.interactive);
        assert_eq!(record.message_count, 0);
        assert_eq!(record.total_input_tokens, 0);
        assert_eq!(record.last_role, None);
        assert_eq!(record.last_finish, Finish::Unknown);
        assert_eq!(record.last_message_at_ms, None);
        assert_eq!(record.last_output, None);
        assert!(record.todos.is_empty());
    }

    #[test]
    fn get_session_skips_corrupt_message_payloads() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_b", "/work", "t", NOW);
        fx.message("ses_b", NOW - 2_000, r#"{"role":"assistant","finish":"stop","tokens":{"input":5,"output":1}}"#);
        fx.message("ses_b", NOW - 1_000, "{not json");

        let record = store.get_session("ses_b").expect("session");
        assert_eq!(record.message_count, 1);
        assert_eq!(record.total_input_tokens, 5);
        assert_eq!(record.last_finish, Finish::Reason("stop".to_string()));
        assert_eq!(record.last_message_at_ms, Some(NOW - 2_000));
    }

    #[test]
    fn get_session_orders_todos_and_drops_unknown_values() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_t", "/work", "t", NOW);
        fx.todo("ses_t", "second", "pending", "low", 2);
        fx.todo("ses_t", "first", "in_progress", "high", 1);
        fx.todo("ses_t", "odd", "blocked", "high", 3);

        let record = store.get_session("ses_t").expect("session");
        assert_eq!(
            record.todos,
            vec![
                TodoItem {
                    content: "first".to_string(),
                    status: TodoStatus::InProgress,
                    priority: TodoPriority::High,
                },
                TodoItem {
                    content: "second".to_string(),
                    status: TodoStatus::Pending,
                    priority: TodoPriority::Low,
                },
            ]
        );
    }

    #[test]
    fn missing_store_reads_as_empty() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let store = SessionStore::new(temp_dir.path().join("absent.db"), Duration::from_millis(100));

        assert!(!store.exists());
        assert_eq!(store.get_session("ses_x"), None);
        assert_eq!(store.query_stats(StatsScope::Global, NOW), AggregateStats::default());
        assert!(store.sessions_active_since("/work", 0, 5).is_empty());
        assert!(store.recent_sessions_for_directory("/work", 5).is_empty());
        assert!(store.recent_messages("ses_x", 10).is_empty());
    }

    #[test]
    fn unknown_session_is_absent() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_a", "/work", "t", NOW);
        assert_eq!(store.get_session("ses_missing"), None);
    }

    #[test]
    fn stats_today_only_counts_sessions_updated_since_utc_midnight() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        let midnight = utc_midnight_ms(NOW);

        fx.session("ses_old", "/work", "old", midnight - 1);
        fx.message("ses_old", midnight - 10, r#"{"role":"assistant","tokens":{"input":7,"output":3}}"#);
        fx.session("ses_new", "/work", "new", NOW);
        fx.message("ses_new", NOW - 10, r#"{"role":"user"}"#);
        fx.message(
            "ses_new",
            NOW - 5,
            r#"{"role":"assistant","tokens":{"input":10,"output":4,"cache":{"read":90}}}"#,
        );

        let today = store.query_stats(StatsScope::Today, NOW);
        assert_eq!(
            today,
            AggregateStats {
                session_count: 1,
                message_count: 2,
                total_input: 100,
                total_output: 4,
            }
        );

        let global = store.query_stats(StatsScope::Global, NOW);
        assert_eq!(global.session_count, 2);
        assert_eq!(global.message_count, 3);
        assert_eq!(global.total_input, 107);
        assert_eq!(global.total_output, 7);
    }

    #[test]
    fn stats_with_no_sessions_are_zero() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, _fx) = store_at(&temp_dir);
        assert_eq!(store.query_stats(StatsScope::Today, NOW), AggregateStats::default());
    }

    #[test]
    fn utc_midnight_truncates_to_day_start() {
        // 2026-02-20T14:56:58Z -> 2026-02-20T00:00:00Z
        assert_eq!(utc_midnight_ms(NOW), 1_771_545_600_000);
        assert_eq!(utc_midnight_ms(1_771_545_600_000), 1_771_545_600_000);
    }

    #[test]
    fn active_since_ranks_by_message_count_within_directory() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_quiet", "/work", "q", NOW);
        fx.session("ses_busy", "/work", "b", NOW - 100);
        fx.session("ses_other_dir", "/elsewhere", "o", NOW);
        fx.session("ses_before", "/work", "p", NOW);

        fx.message("ses_quiet", NOW - 900, "{}");
        for offset in 0..3 {
            fx.message("ses_busy", NOW - 800 + offset, "{}");
        }
        for offset in 0..5 {
            fx.message("ses_other_dir", NOW - 800 + offset, "{}");
        }
        fx.message("ses_before", NOW - 5_000, "{}");

        let ids = store.sessions_active_since("/work", NOW - 1_000, 5);
        assert_eq!(ids, vec!["ses_busy".to_string(), "ses_quiet".to_string()]);

        let limited = store.sessions_active_since("/work", NOW - 1_000, 1);
        assert_eq!(limited, vec!["ses_busy".to_string()]);
    }

    #[test]
    fn recent_for_directory_orders_by_update_time() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_1", "/work", "1", NOW - 300);
        fx.session("ses_2", "/work", "2", NOW - 100);
        fx.session("ses_3", "/work", "3", NOW - 200);
        fx.session("ses_4", "/other", "4", NOW);

        assert_eq!(
            store.recent_sessions_for_directory("/work", 5),
            vec!["ses_2".to_string(), "ses_3".to_string(), "ses_1".to_string()]
        );
        assert_eq!(store.recent_sessions_for_directory("/work", 2).len(), 2);
        assert!(store.recent_sessions_for_directory("/nowhere", 5).is_empty());
    }

    #[test]
    fn recent_messages_are_chronological_with_previews() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let (store, mut fx) = store_at(&temp_dir);
        fx.session("ses_m", "/work", "m", NOW);

        let user = fx.message("ses_m", NOW - 3_000, r#"{"role":"user"}"#);
        fx.part("ses_m", &user, NOW - 3_000, &format!(r#"{{"type":"text","text":"{}"}}"#, "x".repeat(300)));
        fx.message("ses_m", NOW - 2_000, "garbage");
        let reply = fx.message(
            "ses_m",
            NOW - 1_000,
            r#"{"role":"assistant","finish":"tool-calls","modelID":"gpt-5","tokens":{"input":12.0,"output":3,"cache":{"read":4}}}"#,
        );
        fx.part("ses_m", &reply, NOW - 900, r#"{"type":"text","text":"hello"}"#);
        fx.part("ses_m", &reply, NOW - 800, r#"{"type":"text","text":"later"}"#);

        let messages = store.recent_messages("ses_m", 10);
        assert_eq!(messages.len(), 2);

        assert_eq!(messages[0].role, Some(MessageRole::User));
        assert_eq!(messages[0].finish, Finish::Unknown);
        assert_eq!(messages[0].text_preview.as_ref().map(|t| t.chars().count()), Some(200));

        assert_eq!(messages[1].role, Some(MessageRole::Assistant));
        assert_eq!(messages[1].finish, Finish::Reason("tool-calls".to_string()));
        assert_eq!(messages[1].model.as_deref(), Some("gpt-5"));
        assert_eq!(messages[1].tokens_in, 12);
        assert_eq!(messages[1].tokens_out, 3);
        assert_eq!(messages[1].cache_read, 4);
        assert_eq!(messages[1].created_at_ms, NOW - 1_000);
        assert_eq!(messages[1].text_preview.as_deref(), Some("hello"));

        let newest_only = store.recent_messages("ses_m", 1);
        assert_eq!(newest_only.len(), 1);
        assert_eq!(newest_only[0].created_at_ms, NOW - 1_000);
    }

    #[test]
    fn last_non_blank_line_skips_trailing_whitespace() {
        assert_eq!(last_non_blank_line("a\nb\n\n   \n").as_deref(), Some("b"));
        assert_eq!(last_non_blank_line("  \n "), None);
    }
}
