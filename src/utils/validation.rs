//! Dependency validation utilities

use std::process::Command;

use which::which;

use crate::models::Config;

/// Dependency checker for external tools the watcher shells out to.
pub struct DependencyChecker;

#[derive(Debug, Clone)]
pub struct DependencyStatus {
    pub name: String,
    pub found: bool,
    pub version: Option<String>,
    pub path: Option<String>,
}

impl DependencyChecker {
    /// Check whether the configured merge tool binary is on PATH.
    pub fn check_merge_tool(config: &Config) -> DependencyStatus {
        Self::check_binary(&config.advanced.merge_tool_path, &["--version"])
    }

    /// Check whether ffprobe is on PATH.
    pub fn check_ffprobe(config: &Config) -> DependencyStatus {
        Self::check_binary(&config.advanced.ffprobe_path, &["-version"])
    }

    /// Check both dependencies the watcher needs to run at all.
    pub fn check_all(config: &Config) -> Vec<DependencyStatus> {
        vec![Self::check_merge_tool(config), Self::check_ffprobe(config)]
    }

    pub fn all_dependencies_met(config: &Config) -> bool {
        Self::check_all(config).iter().all(|dep| dep.found)
    }

    fn check_binary(name: &str, version_args: &[&str]) -> DependencyStatus {
        match which(name) {
            Ok(path) => DependencyStatus {
                name: name.to_string(),
                found: true,
                version: Self::first_line_of(name, version_args),
                path: Some(path.display().to_string()),
            },
            Err(_) => DependencyStatus {
                name: name.to_string(),
                found: false,
                version: None,
                path: None,
            },
        }
    }

    fn first_line_of(name: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(name).args(args).output().ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.lines().next().map(|s| s.to_string())
    }
}

impl std::fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.found {
            write!(f, "OK {}", self.name)?;
            if let Some(ref version) = self.version {
                write!(f, " ({version})")?;
            }
            if let Some(ref path) = self.path {
                write!(f, "\n  Path: {path}")?;
            }
            Ok(())
        } else {
            write!(f, "MISSING {} - not found on PATH", self.name)
        }
    }
}
