//! Append-only human-readable progress log at `<project>/claude-progress.txt`.

use crate::store;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const PROGRESS_FILE: &str = "claude-progress.txt";

pub fn progress_path(work_dir: &Path) -> PathBuf {
    work_dir.join(PROGRESS_FILE)
}

/// Append `[YYYY-MM-DD HH:MM:SS] message` to the log.
pub fn append(work_dir: &Path, message: &str) -> Result<()> {
    let path = progress_path(work_dir);
    let entry = format!("[{}] {message}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let mut file = store::private_open_options(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(entry.as_bytes())
        .with_context(|| format!("appending to {}", path.display()))
}

/// The last `max_lines` lines of the log, and whether earlier lines were cut.
/// A missing log reads as empty.
pub fn read_tail(work_dir: &Path, max_lines: usize) -> Result<(String, bool)> {
    let path = progress_path(work_dir);
    let contents = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((String::new(), false)),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let lines: Vec<&str> = contents.trim_end_matches('\n').lines().collect();
    if lines.len() <= max_lines {
        return Ok((lines.join("\n"), false));
    }
    Ok((lines[lines.len() - max_lines..].join("\n"), true))
}
