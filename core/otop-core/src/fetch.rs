//! One refresh cycle: discovery + correlation, store statistics, and the
//! tool-provider config, run side by side and joined into a snapshot.
//!
//! Each unit owns its own channel and therefore its own snapshot field. The
//! join waits on every channel against one shared deadline; a unit that
//! misses it contributes its default and the cycle is still published whole.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

use crate::correlate::{correlate_sessions, CorrelatedPair};
use crate::paths::StoragePaths;
use crate::process::{CommandRunner, ProcessScanner, SystemCommandRunner};
use crate::store::{read_tool_providers, AggregateStats, SessionStore, StatsScope, ToolProviderEntry};
use crate::tunables::Tunables;

/// Everything observed in one cycle. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSnapshot {
    pub captured_at: DateTime<Utc>,
    /// In process discovery order.
    pub pairs: Vec<CorrelatedPair>,
    pub today: AggregateStats,
    pub global: AggregateStats,
    pub tool_providers: Option<BTreeMap<String, ToolProviderEntry>>,
}

impl FetchSnapshot {
    pub fn captured_at_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }

    pub fn matched(&self) -> impl Iterator<Item = &CorrelatedPair> {
        self.pairs.iter().filter(|pair| pair.session.is_some())
    }
}

pub struct Fetcher<R: CommandRunner + 'static = SystemCommandRunner> {
    scanner: Arc<ProcessScanner<R>>,
    store: Arc<SessionStore>,
    config_path: PathBuf,
    tunables: Arc<Tunables>,
}

impl Fetcher<SystemCommandRunner> {
    pub fn new(paths: &StoragePaths, tunables: Tunables) -> Self {
        let scanner = ProcessScanner::new(tunables.scanner.clone());
        Self::with_scanner(scanner, paths, tunables)
    }
}

impl<R: CommandRunner + 'static> Fetcher<R> {
    pub fn with_scanner(scanner: ProcessScanner<R>, paths: &StoragePaths, tunables: Tunables) -> Self {
        let store = SessionStore::new(
            paths.db().to_path_buf(),
            tunables.fetch.store_busy_timeout(),
        );
        Self {
            scanner: Arc::new(scanner),
            store: Arc::new(store),
            config_path: paths.config().to_path_buf(),
            tunables: Arc::new(tunables),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn fetch(&self) -> FetchSnapshot {
        self.fetch_at(Utc::now())
    }

    /// Runs one cycle with `now` as the shared instant for age and "today".
    pub fn fetch_at(&self, now: DateTime<Utc>) -> FetchSnapshot {
        let started = Instant::now();
        let deadline = started + self.tunables.unit_timeout();
        let now_ms = now.timestamp_millis();

        let correlation = {
            let scanner = Arc::clone(&self.scanner);
            let store = Arc::clone(&self.store);
            let tunables = Arc::clone(&self.tunables);
            spawn_unit("correlate", move || {
                let processes = scanner.discover();
                correlate_sessions(processes, store.as_ref(), &tunables.correlation)
            })
        };

        let stats = {
            let store = Arc::clone(&self.store);
            spawn_unit("stats", move || {
                (
                    store.query_stats(StatsScope::Today, now_ms),
                    store.query_stats(StatsScope::Global, now_ms),
                )
            })
        };

        let providers = {
            let path = self.config_path.clone();
            spawn_unit("tool-providers", move || read_tool_providers(&path))
        };

        let pairs = join_unit("correlate", correlation, deadline);
        let (today, global) = join_unit("stats", stats, deadline);
        let tool_providers = join_unit("tool-providers", providers, deadline);

        debug!(
            processes = pairs.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetch cycle complete"
        );

        FetchSnapshot {
            captured_at: now,
            pairs,
            today,
            global,
            tool_providers,
        }
    }
}

fn spawn_unit<T, F>(name: &'static str, work: F) -> Option<Receiver<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(format!("otop-{}", name))
        .spawn(move || {
            // The receiver is gone if the join already gave up on us.
            let _ = tx.send(work());
        });

    match spawned {
        Ok(_) => Some(rx),
        Err(err) => {
            warn!(unit = name, error = %err, "Failed to spawn fetch unit");
            None
        }
    }
}

fn join_unit<T: Default>(name: &'static str, rx: Option<Receiver<T>>, deadline: Instant) -> T {
    let Some(rx) = rx else {
        return T::default();
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(value) => value,
        Err(RecvTimeoutError::Timeout) => {
            warn!(unit = name, "Fetch unit timed out; using empty result");
            T::default()
        }
        Err(RecvTimeoutError::Disconnected) => {
            warn!(unit = name, "Fetch unit exited without a result");
            T::default()
        }
    }
}
