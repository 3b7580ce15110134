//! Configuration file management

use crate::models::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Configuration manager for loading and saving config files
pub struct ConfigManager;

impl ConfigManager {
    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Cannot determine config directory")?
            .join("auto-m4b");

        Ok(config_dir.join("config.yaml"))
    }

    /// Ensure config directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Cannot determine config directory")?
            .join("auto-m4b");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .context("Failed to create config directory")?;
        }

        Ok(config_dir)
    }

    /// Load configuration from file or create default
    pub fn load_or_default(path: Option<&PathBuf>) -> Result<Config> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from file
    pub fn load(path: &PathBuf) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(config: &Config, path: Option<&PathBuf>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path()?,
        };

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
        }

        let yaml = serde_yaml::to_string(config)
            .context("Failed to serialize config to YAML")?;

        fs::write(&config_path, yaml)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Initialize a config file with defaults at the default path, refusing
    /// to clobber an existing one unless `force` is set.
    pub fn init(force: bool) -> Result<PathBuf> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() && !force {
            anyhow::bail!(
                "Config file already exists at: {}\nUse --force to overwrite",
                config_path.display()
            );
        }

        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize default config")?;

        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&config_path, yaml)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(config_path)
    }

    /// Validate configuration, returning human-readable warnings for
    /// anything suspicious (nothing here is fatal — the watcher still runs).
    pub fn validate(config: &Config) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if config.runtime.cpu_cores == 0 {
            warnings.push("runtime.cpu_cores is 0; the merge tool will be given --jobs 0".to_string());
        }

        if config.runtime.wait_time_secs > config.runtime.sleeptime_secs * 10 {
            warnings.push(format!(
                "runtime.wait_time_secs ({}) is much larger than sleeptime_secs ({}); books may appear to stall",
                config.runtime.wait_time_secs, config.runtime.sleeptime_secs
            ));
        }

        if which::which(&config.advanced.merge_tool_path).is_err() {
            warnings.push(format!(
                "merge tool '{}' was not found on PATH",
                config.advanced.merge_tool_path
            ));
        }

        if which::which(&config.advanced.ffprobe_path).is_err() {
            warnings.push(format!("ffprobe '{}' was not found on PATH", config.advanced.ffprobe_path));
        }

        if !config.directories.inbox_dir.exists() {
            warnings.push(format!(
                "inbox directory does not exist: {}",
                config.directories.inbox_dir.display()
            ));
        }

        Ok(warnings)
    }

    /// Render the effective configuration (defaults merged with whatever was
    /// loaded) as YAML.
    pub fn show(path: Option<&PathBuf>) -> Result<String> {
        let config = Self::load_or_default(path)?;
        let yaml = serde_yaml::to_string(&config)
            .context("Failed to serialize config")?;
        Ok(yaml)
    }
}
