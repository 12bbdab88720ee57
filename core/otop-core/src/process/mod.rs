//! Process discovery for running opencode instances.
//!
//! `ps` finds candidates, one batched `lsof` call resolves each process's cwd
//! and open log file, and one `tmux list-panes` call binds terminals to panes.
//! The log filename encodes the moment the process attached to its session,
//! which is what pass 2 of correlation ranks on.

mod command;
mod parse;
mod tmux;

pub use command::{CommandRunner, SystemCommandRunner};
pub use parse::{
    argv0_basename, has_excluded_token, is_background_invocation, parse_log_timestamp, parse_lsof_output,
    parse_ps_output, parse_session_hint, OpenFiles, PsRow,
};
pub use tmux::{normalize_tty, parse_tmux_panes, PaneBinding, PANE_FORMAT};

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::OtopError;
use crate::paths::log_dir_marker;
use crate::tunables::ScannerTunables;

/// An opencode process as seen by the OS during one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    /// Raw `etime` column; informational only.
    pub elapsed: String,
    pub tty: String,
    pub tmux: Option<PaneBinding>,
    /// `None` when lsof could not resolve it.
    pub cwd: Option<String>,
    pub command_line: String,
    pub session_hint: Option<String>,
    /// UTC epoch ms from the log filename.
    pub started_at_ms: Option<i64>,
    /// `opencode run` style wrappers: reported, never correlated.
    pub background: bool,
}

impl ProcessRecord {
    pub fn uptime_ms(&self, now_ms: i64) -> Option<i64> {
        self.started_at_ms.map(|started| now_ms.saturating_sub(started))
    }

    /// Working directory usable for inference (known and non-empty).
    pub fn known_cwd(&self) -> Option<&str> {
        self.cwd
            .as_deref()
            .map(str::trim)
            .filter(|cwd| !cwd.is_empty() && *cwd != "?")
    }
}

/// Enumerates opencode processes through a `CommandRunner`.
pub struct ProcessScanner<R: CommandRunner = SystemCommandRunner> {
    runner: R,
    tunables: ScannerTunables,
    own_pid: u32,
}

impl ProcessScanner<SystemCommandRunner> {
    pub fn new(tunables: ScannerTunables) -> Self {
        Self::with_runner(SystemCommandRunner, tunables)
    }
}

impl<R: CommandRunner> ProcessScanner<R> {
    pub fn with_runner(runner: R, tunables: ScannerTunables) -> Self {
        Self {
            runner,
            tunables,
            own_pid: std::process::id(),
        }
    }

    /// Overrides the pid treated as "this observer". Used by tests.
    pub fn with_own_pid(mut self, pid: u32) -> Self {
        self.own_pid = pid;
        self
    }

    /// Returns every monitored process in `ps` order. Never fails: each
    /// external source that errors or times out simply contributes nothing.
    pub fn discover(&self) -> Vec<ProcessRecord> {
        let rows = self.list_candidates();
        if rows.is_empty() {
            return Vec::new();
        }

        let pids: Vec<u32> = rows.iter().map(|row| row.pid).collect();
        let open_files = self.open_files(&pids);
        let panes = self.pane_bindings();

        rows.into_iter()
            .map(|row| {
                let files = open_files.get(&row.pid).cloned().unwrap_or_default();
                let started_at_ms = files.log_path.as_deref().and_then(parse_log_timestamp);
                ProcessRecord {
                    pid: row.pid,
                    cpu_percent: row.cpu_percent,
                    memory_mb: row.rss_kb as f64 / 1024.0,
                    tmux: panes.get(normalize_tty(&row.tty)).cloned(),
                    cwd: files.cwd,
                    session_hint: parse_session_hint(&row.args),
                    started_at_ms,
                    background: is_background_invocation(
                        &row.args,
                        &self.tunables.background_keywords,
                    ),
                    elapsed: row.elapsed,
                    tty: row.tty,
                    command_line: row.args,
                }
            })
            .collect()
    }

    fn list_candidates(&self) -> Vec<PsRow> {
        let args = vec!["axo".to_string(), "pid,pcpu,rss,tty,etime,args".to_string()];
        let Some(output) = self.run_or_degrade("ps", &args, self.tunables.ps_timeout()) else {
            return Vec::new();
        };

        parse_ps_output(&output)
            .into_iter()
            .filter(|row| self.is_monitored(row))
            .collect()
    }

    fn is_monitored(&self, row: &PsRow) -> bool {
        if row.pid == self.own_pid {
            return false;
        }
        if !row.args.contains(&self.tunables.binary_name) {
            return false;
        }
        if has_excluded_token(&row.args, &self.tunables.excluded_markers) {
            return false;
        }
        argv0_basename(&row.args) == Some(self.tunables.binary_name.as_str())
    }

    fn open_files(&self, pids: &[u32]) -> HashMap<u32, OpenFiles> {
        let pid_list = pids
            .iter()
            .map(|pid| pid.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let args = vec!["-p".to_string(), pid_list];
        let output = self
            .run_or_degrade("lsof", &args, self.tunables.lsof_timeout())
            .unwrap_or_default();
        parse_lsof_output(&output, pids, log_dir_marker())
    }

    fn pane_bindings(&self) -> HashMap<String, PaneBinding> {
        self.run_or_degrade("tmux", &tmux::pane_listing_args(), self.tunables.tmux_timeout())
            .map(|output| parse_tmux_panes(&output))
            .unwrap_or_default()
    }

    fn run_or_degrade(
        &self,
        program: &str,
        args: &[String],
        timeout: std::time::Duration,
    ) -> Option<String> {
        match self.runner.run(program, args, timeout) {
            Ok(output) => Some(output),
            Err(err @ OtopError::Timeout { .. }) => {
                warn!(command = program, error = %err, "External command timed out");
                None
            }
            Err(err) => {
                debug!(command = program, error = %err, "External command unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRunner {
        outputs: HashMap<&'static str, Result<String>>,
        calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl FakeRunner {
        fn with(mut self, program: &'static str, output: &str) -> Self {
            self.outputs.insert(program, Ok(output.to_string()));
            self
        }

        fn failing(mut self, program: &'static str) -> Self {
            self.outputs.insert(
                program,
                Err(OtopError::Timeout {
                    command: program.to_string(),
                    timeout_ms: 5,
                }),
            );
            self
        }

        fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
            self.calls
                .lock()
                .expect("lock calls")
                .iter()
                .filter(|(name, _)| name == program)
                .map(|(_, args)| args.clone())
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[String], _timeout: Duration) -> Result<String> {
            self.calls
                .lock()
                .expect("lock calls")
                .push((program.to_string(), args.to_vec()));
            match self.outputs.get(program) {
                Some(Ok(output)) => Ok(output.clone()),
                Some(Err(_)) => Err(OtopError::Timeout {
                    command: program.to_string(),
                    timeout_ms: 5,
                }),
                None => Err(OtopError::ToolUnavailable {
                    command: program.to_string(),
                    details: "not faked".to_string(),
                }),
            }
        }
    }

    const PS: &str = "\
  PID  %CPU    RSS TT       ELAPSED ARGS
  500   0.0   1024 ttys000    00:10 /usr/local/bin/otop
  501   3.0  51200 ttys001    10:00 /opt/homebrew/bin/opencode
  502  40.0 102400 ttys002    05:00 opencode -s ses_explicit
  503   0.5   2048 ??         01:00 opencode run lsp-wrapper
  504   0.0    512 ttys003    00:01 grep opencode
  505   0.0    512 ttys004    00:01 node /tmp/opencode-htop.js
  506   0.0    512 ttys005    00:01 vim notes-about-opencode.md
  777   9.9   4096 ttys006    00:02 opencode
";

    const LSOF: &str = "\
COMMAND    PID USER   FD   TYPE DEVICE SIZE/OFF     NODE NAME
opencode   501 me    cwd    DIR   1,16      640  1234567 /Users/me/Code/app
opencode   501 me     12w   REG   1,16    98765  7654321 /Users/me/.local/share/opencode/log/2026-02-20T145658.log
opencode   502 me    cwd    DIR   1,16      640  1234568 /Users/me
opencode   503 me    cwd    DIR   1,16      640  1234569 /Users/me/Code/app
";

    const TMUX: &str = "/dev/ttys001\twork\tapp\twork:1.0\n";

    fn scanner(runner: FakeRunner) -> ProcessScanner<FakeRunner> {
        ProcessScanner::with_runner(runner, ScannerTunables::default()).with_own_pid(777)
    }

    #[test]
    fn discover_filters_to_monitored_binary() {
        let runner = FakeRunner::default()
            .with("ps", PS)
            .with("lsof", LSOF)
            .with("tmux", TMUX);
        let scanner = scanner(runner);
        let processes = scanner.discover();

        let pids: Vec<u32> = processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![501, 502, 503]);
    }

    #[test]
    fn discover_merges_lsof_tmux_and_argv_signals() {
        let runner = FakeRunner::default()
            .with("ps", PS)
            .with("lsof", LSOF)
            .with("tmux", TMUX);
        let processes = scanner(runner).discover();

        let first = &processes[0];
        assert_eq!(first.cwd.as_deref(), Some("/Users/me/Code/app"));
        assert_eq!(first.started_at_ms, Some(1_771_599_418_000));
        assert!((first.memory_mb - 50.0).abs() < f64::EPSILON);
        assert_eq!(
            first.tmux,
            Some(PaneBinding {
                session: "work".to_string(),
                window: Some("app".to_string()),
                target: Some("work:1.0".to_string()),
            })
        );
        assert!(first.session_hint.is_none());
        assert!(!first.background);

        let second = &processes[1];
        assert_eq!(second.session_hint.as_deref(), Some("ses_explicit"));
        assert!(second.started_at_ms.is_none());
        assert!(second.tmux.is_none());

        assert!(processes[2].background);
    }

    #[test]
    fn discover_batches_lsof_into_one_call() {
        let runner = FakeRunner::default()
            .with("ps", PS)
            .with("lsof", LSOF)
            .with("tmux", TMUX);
        let scanner = scanner(runner);
        scanner.discover();

        let lsof_calls = scanner.runner.calls_to("lsof");
        assert_eq!(lsof_calls.len(), 1);
        assert_eq!(lsof_calls[0], vec!["-p".to_string(), "501,502,503".to_string()]);
        assert_eq!(scanner.runner.calls_to("tmux").len(), 1);
    }

    #[test]
    fn lsof_timeout_leaves_cwd_unknown_but_keeps_processes() {
        let runner = FakeRunner::default()
            .with("ps", PS)
            .failing("lsof")
            .with("tmux", TMUX);
        let processes = scanner(runner).discover();

        assert_eq!(processes.len(), 3);
        assert!(processes.iter().all(|p| p.cwd.is_none()));
        assert!(processes.iter().all(|p| p.started_at_ms.is_none()));
        assert!(processes[0].tmux.is_some());
    }

    #[test]
    fn ps_failure_yields_empty_scan_without_further_calls() {
        let runner = FakeRunner::default().failing("ps");
        let scanner = scanner(runner);
        assert!(scanner.discover().is_empty());
        assert!(scanner.runner.calls_to("lsof").is_empty());
    }

    #[test]
    fn exclusion_markers_do_not_drop_instances_with_similar_arguments() {
        let ps = "\
  PID  %CPU    RSS TT       ELAPSED ARGS
  601   0.0   1024 ttys001    00:10 opencode /home/me/otop-fork
  602   0.0   1024 ttys002    00:10 opencode -s ses_grepfix01
  603   0.0   1024 ttys003    00:10 opencode /usr/local/bin/otop
";
        let runner = FakeRunner::default().with("ps", ps);
        let processes = scanner(runner).discover();

        let pids: Vec<u32> = processes.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![601, 602]);
        assert_eq!(processes[1].session_hint.as_deref(), Some("ses_grepfix01"));
    }

    #[test]
    fn known_cwd_rejects_unknown_markers() {
        let mut record = ProcessRecord {
            pid: 1,
            cpu_percent: 0.0,
            memory_mb: 0.0,
            elapsed: String::new(),
            tty: "??".to_string(),
            tmux: None,
            cwd: Some("?".to_string()),
            command_line: "opencode".to_string(),
            session_hint: None,
            started_at_ms: Some(1_000),
            background: false,
        };
        assert!(record.known_cwd().is_none());
        record.cwd = Some(String::new());
        assert!(record.known_cwd().is_none());
        record.cwd = Some("/repo".to_string());
        assert_eq!(record.known_cwd(), Some("/repo"));
        assert_eq!(record.uptime_ms(4_000), Some(3_000));
    }
}
