//! Line grammars for `ps` and `lsof` output plus command-line classification.
//!
//! Every parser here is tolerant per line: a malformed row is skipped, never
//! fatal to the scan.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

use crate::patterns::{RE_LOG_FILENAME, RE_SESSION_HINT};

/// One row of `ps axo pid,pcpu,rss,tty,etime,args`.
#[derive(Debug, Clone, PartialEq)]
pub struct PsRow {
    pub pid: u32,
    pub cpu_percent: f64,
    pub rss_kb: u64,
    pub tty: String,
    pub elapsed: String,
    pub args: String,
}

/// Parses `ps` output. The header and any row whose numeric columns do not
/// parse are dropped.
pub fn parse_ps_output(output: &str) -> Vec<PsRow> {
    output.lines().filter_map(parse_ps_line).collect()
}

fn parse_ps_line(line: &str) -> Option<PsRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    let pid = fields[0].parse::<u32>().ok()?;
    let cpu_percent = fields[1].parse::<f64>().ok()?;
    let rss_kb = fields[2].parse::<u64>().ok()?;
    Some(PsRow {
        pid,
        cpu_percent,
        rss_kb,
        tty: fields[3].to_string(),
        elapsed: fields[4].to_string(),
        args: fields[5..].join(" "),
    })
}

/// Basename of argv[0], e.g. `opencode` for `/usr/local/bin/opencode -c`.
pub fn argv0_basename(args: &str) -> Option<&str> {
    let first = args.split_whitespace().next()?;
    Path::new(first).file_name()?.to_str()
}

/// True when any whole argv token, compared by basename, equals a marker.
/// Substrings do not count: `/home/me/otop-fork` is not `otop`.
pub fn has_excluded_token(args: &str, markers: &[String]) -> bool {
    args.split_whitespace().any(|token| {
        let base = Path::new(token)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(token);
        markers.iter().any(|marker| marker == base)
    })
}

/// A pure classification of the parsed command line: background/tool-wrapper
/// instances carry a known sub-invocation keyword as their second token.
pub fn is_background_invocation(args: &str, keywords: &[String]) -> bool {
    args.split_whitespace()
        .nth(1)
        .map(|token| keywords.iter().any(|keyword| keyword == token))
        .unwrap_or(false)
}

/// Explicit session id passed with `-s` / `--session`.
pub fn parse_session_hint(args: &str) -> Option<String> {
    RE_SESSION_HINT
        .captures(args)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Epoch milliseconds encoded in a log filename such as
/// `2026-02-20T145658.log`. The timestamp is UTC, never local time.
pub fn parse_log_timestamp(log_path: &str) -> Option<i64> {
    let base = Path::new(log_path).file_name()?.to_str()?;
    let caps = RE_LOG_FILENAME.captures(base)?;
    let field = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = i32::try_from(field(1)?).ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
    let datetime = date.and_hms_opt(field(4)?, field(5)?, field(6)?)?;
    Some(datetime.and_utc().timestamp_millis())
}

/// Working directory and log file found for one pid in `lsof` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenFiles {
    pub cwd: Option<String>,
    pub log_path: Option<String>,
}

const LSOF_MIN_COLUMNS: usize = 9;
const DELETED_SUFFIX: &str = " (deleted)";

/// Parses the output of one batched `lsof -p pid,pid,...` call.
///
/// Every requested pid gets an entry, so a pid missing from the output still
/// reads as "cwd unknown". Unlinked log files are still listed while the
/// descriptor stays open, which is what makes the log name usable.
pub fn parse_lsof_output(output: &str, pids: &[u32], log_marker: &str) -> HashMap<u32, OpenFiles> {
    let mut result: HashMap<u32, OpenFiles> = pids
        .iter()
        .map(|pid| (*pid, OpenFiles::default()))
        .collect();

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < LSOF_MIN_COLUMNS {
            continue;
        }
        let Ok(pid) = fields[1].parse::<u32>() else {
            continue;
        };
        let Some(entry) = result.get_mut(&pid) else {
            continue;
        };

        let joined = fields[LSOF_MIN_COLUMNS - 1..].join(" ");
        let name = joined.strip_suffix(DELETED_SUFFIX).unwrap_or(&joined);

        if fields[3] == "cwd" {
            entry.cwd = Some(name.to_string());
        }
        if name.contains(".log") && name.contains(log_marker) {
            entry.log_path = Some(name.to_string());
        }
    }

    result
}
