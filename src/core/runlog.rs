//! Global append-only run log: one tab-separated row per terminal outcome.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    Success,
    Failed,
}

impl RunResult {
    fn as_str(&self) -> &'static str {
        match self {
            RunResult::Success => "SUCCESS",
            RunResult::Failed => "FAILED",
        }
    }
}

/// Append one `<timestamp>\t<key>\t<SUCCESS|FAILED>\t<elapsed_seconds|'-'>`
/// row to the global log.
pub fn append(log_path: &Path, timestamp: &str, key: &str, result: RunResult, elapsed_secs: Option<u64>) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating run log directory {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening run log {}", log_path.display()))?;

    let elapsed = elapsed_secs.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    writeln!(file, "{timestamp}\t{key}\t{}\t{elapsed}", result.as_str()).context("writing run log row")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_tab_separated_rows() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("m4b-tool.log");

        append(&log_path, "2026-08-01 00:00:00", "the_hobbit", RunResult::Success, Some(42)).unwrap();
        append(&log_path, "2026-08-01 00:01:00", "the_sequel", RunResult::Failed, None).unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "2026-08-01 00:00:00\tthe_hobbit\tSUCCESS\t42");
        assert_eq!(lines[1], "2026-08-01 00:01:00\tthe_sequel\tFAILED\t-");
    }
}
