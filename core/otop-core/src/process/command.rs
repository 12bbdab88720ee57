//! Bounded execution of external OS tools (`ps`, `lsof`, `tmux`).

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{OtopError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external command and returns its stdout.
///
/// Implementations must honour `timeout`; callers treat any error as
/// "this source is empty for the current cycle".
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String>;
}

/// Spawns real processes. stdout is drained on a helper thread so a chatty
/// tool cannot fill the pipe and stall `try_wait`.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String> {
        let label = program.to_string();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| OtopError::ToolUnavailable {
                command: label.clone(),
                details: err.to_string(),
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| OtopError::ToolUnavailable {
                command: label.clone(),
                details: "stdout not captured".to_string(),
            })?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let result = stdout.read_to_end(&mut buf).map(|_| buf);
            let _ = tx.send(result);
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(OtopError::Timeout {
                            command: label,
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(err) => {
                    return Err(OtopError::ToolUnavailable {
                        command: label,
                        details: err.to_string(),
                    })
                }
            }
        };

        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(POLL_INTERVAL);
        let bytes = match rx.recv_timeout(remaining) {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                return Err(OtopError::Io {
                    context: format!("reading {} output", label),
                    source: err,
                })
            }
            Err(_) => {
                return Err(OtopError::Timeout {
                    command: label,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        // lsof exits non-zero when a pid vanished between scans but still
        // prints rows for the rest; keep whatever was written.
        if !status.success() && bytes.is_empty() {
            return Err(OtopError::ToolUnavailable {
                command: label,
                details: format!("exited with {}", status),
            });
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
