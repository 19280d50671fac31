//! Line-oriented log files: append one entry, read all entries.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Longest reason kept in the failed log, in characters.
pub const MAX_REASON_CHARS: usize = 500;

/// One line of the failed log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub id: String,
    pub reason: String,
}

/// Append `line` plus a newline with a single write, so an interrupted append
/// can only damage the entry being written.
pub(super) fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log for append: {}", path.display()))?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
        .with_context(|| format!("append to log: {}", path.display()))?;
    Ok(())
}

/// Non-empty trimmed lines of `path`; a missing file has no lines.
pub(super) fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("read log: {}", path.display())),
    };
    Ok(text
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Id column of a log line (everything before the first tab).
pub(super) fn id_of(line: &str) -> &str {
    line.split('\t').next().unwrap_or(line).trim()
}

pub(super) fn parse_failed(line: &str) -> FailedEntry {
    match line.split_once('\t') {
        Some((id, reason)) => FailedEntry {
            id: id.trim().to_string(),
            reason: reason.to_string(),
        },
        None => FailedEntry {
            id: line.trim().to_string(),
            reason: String::new(),
        },
    }
}

/// Flatten a reason to a single tab-free line of bounded length.
pub fn one_line_reason(reason: &str) -> String {
    let flat: String = reason
        .trim()
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    match flat.char_indices().nth(MAX_REASON_CHARS) {
        Some((cut, _)) => flat[..cut].to_string(),
        None => flat,
    }
}
