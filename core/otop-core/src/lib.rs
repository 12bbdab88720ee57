//! # otop-core
//!
//! Observation engine for running opencode instances: finds the processes,
//! reads opencode's session database, decides which session each process is
//! driving, and labels what it is doing.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. A fetch cycle fans out onto plain threads.
//! - **Read-only**: The session database is opened read-only per query; opencode
//!   keeps writing to it concurrently.
//! - **Graceful degradation**: A failing tool, locked database, or bad row
//!   yields empty/default values, never an aborted cycle.
//! - **Fresh every cycle**: Nothing is cached between fetches.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use otop_core::{infer_status, Fetcher, StoragePaths, Tunables};
//!
//! let tunables = Tunables::default();
//! let fetcher = Fetcher::new(&StoragePaths::default(), tunables.clone());
//! let snapshot = fetcher.fetch();
//! for pair in &snapshot.pairs {
//!     let status = infer_status(
//!         pair.session.as_ref(),
//!         pair.process.cpu_percent,
//!         snapshot.captured_at_ms(),
//!         &tunables.status,
//!     );
//!     println!("{} {}", pair.process.pid, status);
//! }
//! ```

pub mod correlate;
pub mod error;
pub mod fetch;
pub mod format;
pub mod paths;
pub mod patterns;
pub mod process;
pub mod status;
pub mod store;
pub mod tunables;

pub use correlate::{correlate, correlate_sessions, CorrelatedPair, SessionLookup};
pub use error::{OtopError, Result};
pub use fetch::{FetchSnapshot, Fetcher};
pub use format::*;
pub use paths::StoragePaths;
pub use process::{CommandRunner, PaneBinding, ProcessRecord, ProcessScanner, SystemCommandRunner};
pub use status::{classify, infer_status, SessionStatus};
pub use store::{
    read_tool_providers, AggregateStats, Finish, MessageDetail, MessageRole, SessionRecord,
    SessionStore, StatsScope, TodoItem, TodoPriority, TodoStatus, ToolProviderEntry,
};
pub use tunables::*;
