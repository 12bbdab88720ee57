//! Error types for otop-core operations.
//!
//! Leaf readers return these internally; public entry points fold them into
//! empty/default values so one failing source never aborts a fetch cycle.

use std::path::PathBuf;

/// All errors that can occur while observing opencode.
#[derive(Debug, thiserror::Error)]
pub enum OtopError {
    // ─────────────────────────────────────────────────────────────────────
    // External Tools
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command unavailable: {command}: {details}")]
    ToolUnavailable { command: String, details: String },

    #[error("Command timed out after {timeout_ms}ms: {command}")]
    Timeout { command: String, timeout_ms: u64 },

    // ─────────────────────────────────────────────────────────────────────
    // Session Store
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session store unreachable at {path}: {source}")]
    StoreUnreachable {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Query failed: {context}: {source}")]
    QueryFailed {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Payloads
    // ─────────────────────────────────────────────────────────────────────
    #[error("Malformed record: {context}: {details}")]
    MalformedRecord { context: String, details: String },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl OtopError {
    pub(crate) fn query(context: impl Into<String>) -> impl FnOnce(rusqlite::Error) -> Self {
        let context = context.into();
        move |source| OtopError::QueryFailed { context, source }
    }
}

/// Convenience type alias for Results using OtopError.
pub type Result<T> = std::result::Result<T, OtopError>;
