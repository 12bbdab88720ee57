//! Assigns opencode sessions to running processes.
//!
//! Two passes share one claimed set that lives only for a single call:
//!
//! 1. Explicit: a process started with `-s <id>` owns that id outright.
//! 2. Inferred: the rest, oldest first, pick the best unclaimed session in
//!    their working directory. Tier A ranks sessions by messages written since
//!    the process started; Tier B falls back to the most recently updated.
//!
//! A session id is resolved for at most one process per call.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::process::ProcessRecord;
use crate::store::{SessionRecord, SessionStore};
use crate::tunables::CorrelationTunables;

/// Read-only queries correlation needs from the session store.
pub trait SessionLookup {
    /// Tier A candidates: sessions in `directory` with messages created at or
    /// after `since_ms`, ranked by that message count.
    fn active_since(&self, directory: &str, since_ms: i64, limit: usize) -> Vec<String>;

    /// Tier B candidates: sessions in `directory`, newest update first.
    fn recent_for_directory(&self, directory: &str, limit: usize) -> Vec<String>;

    fn session(&self, session_id: &str) -> Option<SessionRecord>;
}

impl SessionLookup for SessionStore {
    fn active_since(&self, directory: &str, since_ms: i64, limit: usize) -> Vec<String> {
        self.sessions_active_since(directory, since_ms, limit)
    }

    fn recent_for_directory(&self, directory: &str, limit: usize) -> Vec<String> {
        self.recent_sessions_for_directory(directory, limit)
    }

    fn session(&self, session_id: &str) -> Option<SessionRecord> {
        self.get_session(session_id)
    }
}

/// A discovered process and the session it drives, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub process: ProcessRecord,
    pub session: Option<SessionRecord>,
}

/// Resolves pid → session id for every process that can be matched.
pub fn correlate<L: SessionLookup + ?Sized>(
    processes: &[ProcessRecord],
    lookup: &L,
    tunables: &CorrelationTunables,
) -> HashMap<u32, String> {
    let mut claimed: HashSet<String> = HashSet::new();
    let mut resolved: HashMap<u32, String> = HashMap::new();

    claim_explicit(processes, &mut claimed, &mut resolved);

    let mut remaining: Vec<&ProcessRecord> = processes
        .iter()
        .filter(|process| !process.background && !resolved.contains_key(&process.pid))
        .collect();
    // Stable: equal start times keep discovery order. Unknown sorts first.
    remaining.sort_by_key(|process| process.started_at_ms);

    for process in remaining {
        if let Some(session_id) = infer_session(process, lookup, tunables, &claimed) {
            tracing::debug!(pid = process.pid, %session_id, "Inferred session");
            claimed.insert(session_id.clone());
            resolved.insert(process.pid, session_id);
        }
    }

    resolved
}

/// Runs [`correlate`] and loads each matched session, keeping discovery order.
/// Background processes are reported with no session.
pub fn correlate_sessions<L: SessionLookup + ?Sized>(
    processes: Vec<ProcessRecord>,
    lookup: &L,
    tunables: &CorrelationTunables,
) -> Vec<CorrelatedPair> {
    let resolved = correlate(&processes, lookup, tunables);
    processes
        .into_iter()
        .map(|process| {
            let session = resolved
                .get(&process.pid)
                .and_then(|session_id| lookup.session(session_id));
            CorrelatedPair { process, session }
        })
        .collect()
}

fn claim_explicit(
    processes: &[ProcessRecord],
    claimed: &mut HashSet<String>,
    resolved: &mut HashMap<u32, String>,
) {
    for process in processes.iter().filter(|process| !process.background) {
        let Some(hint) = process.session_hint.as_ref() else {
            continue;
        };
        if claimed.insert(hint.clone()) {
            resolved.insert(process.pid, hint.clone());
        } else {
            tracing::debug!(
                pid = process.pid,
                session_id = %hint,
                "Explicit session already claimed; falling back to inference"
            );
        }
    }
}

fn infer_session<L: SessionLookup + ?Sized>(
    process: &ProcessRecord,
    lookup: &L,
    tunables: &CorrelationTunables,
    claimed: &HashSet<String>,
) -> Option<String> {
    let directory = process.known_cwd()?;
    let window = tunables.candidate_window;
    let first_unclaimed =
        |candidates: Vec<String>| candidates.into_iter().find(|id| !claimed.contains(id));

    if let Some(started_at_ms) = process.started_at_ms {
        if let Some(session_id) = first_unclaimed(lookup.active_since(directory, started_at_ms, window)) {
            return Some(session_id);
        }
    }

    first_unclaimed(lookup.recent_for_directory(directory, window))
}
