//! otop: observer for running opencode instances.
//!
//! Finds opencode processes, matches each to the session it is driving in
//! opencode's SQLite store, and reports what it is doing.
//!
//! ## Subcommands
//!
//! - `sessions`: JSON list of running sessions (for scripts)
//! - `snapshot`: one full fetch cycle as JSON
//! - `watch`: refreshing plain-text table
//! - `messages`: recent messages of one session

mod logging;
mod report;
mod settings;

use clap::{Parser, Subcommand};
use otop_core::{Fetcher, StoragePaths, Tunables};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::report::SessionFilter;

#[derive(Parser)]
#[command(name = "otop")]
#[command(about = "Observe running opencode sessions")]
#[command(version)]
struct Cli {
    /// Settings file (default: ~/.config/otop/otop.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// opencode database (default: $XDG_DATA_HOME/opencode/opencode.db)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print running sessions as JSON
    Sessions {
        /// Include background processes and processes without a session
        #[arg(short, long)]
        all: bool,

        /// Include sessions started with a permission override
        #[arg(long)]
        include_noninteractive: bool,
    },

    /// Print one full fetch cycle as JSON
    Snapshot,

    /// Refresh a plain-text table until interrupted
    Watch {
        /// Seconds between refreshes (default from settings)
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,

        /// Stop after this many refreshes
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Print the most recent messages of a session
    Messages {
        #[arg(value_name = "SESSION_ID")]
        session_id: String,

        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "otop failed");
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let tunables = settings::load_settings(cli.config)?;
    let mut paths = StoragePaths::default();
    if let Some(db) = cli.db {
        paths = paths.with_db(db);
    }

    let fetcher = Fetcher::new(&paths, tunables.clone());
    if !fetcher.store().exists() {
        return Err(format!(
            "opencode db not found at {}",
            fetcher.store().path().display()
        ));
    }

    match cli.command {
        Commands::Sessions {
            all,
            include_noninteractive,
        } => {
            let snapshot = fetcher.fetch();
            let filter = SessionFilter {
                include_all: all,
                include_noninteractive,
            };
            print_json(&report::session_entries(&snapshot, &tunables.status, filter))
        }
        Commands::Snapshot => {
            let snapshot = fetcher.fetch();
            print_json(&report::snapshot_report(&snapshot, &tunables.status))
        }
        Commands::Watch {
            interval_secs,
            cycles,
        } => {
            watch(&fetcher, &tunables, interval_secs, cycles);
            Ok(())
        }
        Commands::Messages {
            session_id,
            limit,
            json,
        } => messages(&fetcher, &session_id, limit, json),
    }
}

fn watch(fetcher: &Fetcher, tunables: &Tunables, interval_secs: Option<u64>, cycles: Option<u64>) {
    let interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| tunables.fetch.refresh_interval());
    let mut completed = 0u64;

    loop {
        let snapshot = fetcher.fetch();
        tracing::info!(
            processes = snapshot.pairs.len(),
            matched = snapshot.matched().count(),
            "Refreshed"
        );
        // Clear screen and home the cursor before each frame.
        print!("\x1b[2J\x1b[H");
        println!("{}", report::render_table(&snapshot, &tunables.status));

        completed += 1;
        if cycles.is_some_and(|limit| completed >= limit) {
            break;
        }
        thread::sleep(interval);
    }
}

fn messages(fetcher: &Fetcher, session_id: &str, limit: usize, json: bool) -> Result<(), String> {
    let store = fetcher.store();
    let session = store
        .get_session(session_id)
        .ok_or_else(|| format!("session {} not found", session_id))?;
    let messages = store.recent_messages(session_id, limit);

    if json {
        return print_json(&messages);
    }

    println!("{}  {}", session.id, session.title);
    println!(
        "{}",
        report::cost_line(
            session.total_cost,
            session.total_input_tokens,
            session.total_output_tokens
        )
    );
    println!("{}", report::render_messages(&messages));
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|err| format!("Failed to serialize output: {}", err))?;
    println!("{}", out);
    Ok(())
}
