//! The startup banner and dependency-check report.
//!
//! Deliberately plain text plus a couple of box-drawing characters — no
//! `indicatif`/`console` styling, since the watcher's normal output target is
//! a log file, not an interactive terminal.

use chrono::Local;

use crate::models::Config;
use crate::utils::DependencyStatus;

/// Render the startup banner shown once when the watcher begins a tick with
/// books to process, or "watching" when the inbox is empty.
pub fn render(config: &Config, verb: &str) -> String {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S");
    let dash = "-".repeat(24);

    if config.diagnostics.no_ascii {
        format!(
            "auto-m4b - {now}\n{verb} for new books in {}\n",
            config.directories.inbox_dir.display()
        )
    } else {
        format!(
            "{dash}  auto-m4b - {now}  -{dash}\n{verb} for new books in {}\n",
            config.directories.inbox_dir.display()
        )
    }
}

/// Render the output of `auto-m4b check`.
pub fn render_dependency_report(statuses: &[DependencyStatus]) -> String {
    let mut out = String::from("Checking dependencies...\n\n");
    for status in statuses {
        out.push_str(&format!("  {status}\n"));
    }
    out.push('\n');
    if statuses.iter().all(|s| s.found) {
        out.push_str("All dependencies found\n");
    } else {
        out.push_str("Some dependencies are missing\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_includes_inbox_path() {
        let config = Config::default();
        let banner = render(&config, "Watching");
        assert!(banner.contains("Watching for new books"));
        assert!(banner.contains(&config.directories.inbox_dir.display().to_string()));
    }

    #[test]
    fn no_ascii_mode_skips_box_drawing() {
        let mut config = Config::default();
        config.diagnostics.no_ascii = true;
        let banner = render(&config, "Checking");
        assert!(!banner.starts_with('-'));
    }
}
