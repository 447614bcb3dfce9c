// Configuration File Support
//
// TOML configuration with environment variable overrides.
// Loaded from the platform config directory, e.g. ~/.config/opsgate/config.toml

use crate::audit::{AuditSink, FileAuditSink, TracingAuditSink};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::tools::{ExecutionTimeout, Interpreter, RunnerConfig, DEFAULT_TIMEOUT_SECS};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Upper bound for the runner timeout
pub const MAX_TIMEOUT_SECS: u64 = 3600;

pub const ENV_LOG_LEVEL: &str = "OPSGATE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "OPSGATE_LOG_FORMAT";
pub const ENV_TIMEOUT_SECS: &str = "OPSGATE_TIMEOUT_SECS";
pub const ENV_DRY_RUN: &str = "OPSGATE_DRY_RUN";
pub const ENV_AUDIT_FILE: &str = "OPSGATE_AUDIT_FILE";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingSettings,

    pub runner: RunnerSettings,

    pub audit: AuditSettings,
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (plain, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

/// `[runner]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Seconds before a running batch is killed
    pub timeout_secs: u64,

    /// Synthesize results instead of spawning processes
    pub dry_run: bool,

    /// Interpreter program (platform default when unset)
    pub program: Option<String>,

    /// Interpreter arguments placed before the command line
    pub args: Option<Vec<String>>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            dry_run: false,
            program: None,
            args: None,
        }
    }
}

/// `[audit]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditSettings {
    /// Sink kind (log, file)
    pub sink: String,

    /// Audit file path (required when sink is file)
    pub file_path: Option<PathBuf>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            sink: "log".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default config directory
    ///
    /// A missing file yields the defaults (with environment overrides).
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::debug!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Default configuration file path
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "opsgate") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("opsgate")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides
    ///
    /// - OPSGATE_LOG_LEVEL
    /// - OPSGATE_LOG_FORMAT
    /// - OPSGATE_TIMEOUT_SECS
    /// - OPSGATE_DRY_RUN
    /// - OPSGATE_AUDIT_FILE (also selects the file sink)
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; invalid values are ignored
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            if level.parse::<LogLevel>().is_ok() {
                self.logging.level = level;
            }
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            if format.parse::<LogFormat>().is_ok() {
                self.logging.format = format;
            }
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
            if let Ok(timeout) = timeout.trim().parse::<u64>() {
                if (1..=MAX_TIMEOUT_SECS).contains(&timeout) {
                    self.runner.timeout_secs = timeout;
                }
            }
        }
        if let Some(dry_run) = lookup(ENV_DRY_RUN) {
            if let Some(dry_run) = parse_flag(&dry_run) {
                self.runner.dry_run = dry_run;
            }
        }
        if let Some(path) = lookup(ENV_AUDIT_FILE) {
            if !path.trim().is_empty() {
                self.audit.sink = "file".to_string();
                self.audit.file_path = Some(PathBuf::from(path));
            }
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )
            })?;

        self.logging
            .format
            .parse::<LogFormat>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "Invalid log format: {}. Must be one of: plain, json",
                    self.logging.format
                )
            })?;

        if !(1..=MAX_TIMEOUT_SECS).contains(&self.runner.timeout_secs) {
            anyhow::bail!(
                "Runner timeout must be between 1 and {} seconds, got {}",
                MAX_TIMEOUT_SECS,
                self.runner.timeout_secs
            );
        }

        if let Some(ref program) = self.runner.program {
            if program.trim().is_empty() {
                anyhow::bail!("Runner interpreter program cannot be empty");
            }
        }

        match self.audit.sink.to_lowercase().as_str() {
            "log" => {}
            "file" => {
                if self.audit.file_path.is_none() {
                    anyhow::bail!("Audit sink 'file' requires audit.file_path");
                }
            }
            _ => anyhow::bail!(
                "Invalid audit sink: {}. Must be one of: log, file",
                self.audit.sink
            ),
        }

        Ok(())
    }

    /// Logging configuration for [`LoggingConfig::init`]
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::new(
            self.logging.level.parse().unwrap_or_default(),
            self.logging.format.parse().unwrap_or_default(),
        )
    }

    /// Runner configuration described by the `[runner]` section
    pub fn runner_config(&self) -> RunnerConfig {
        let mut config =
            RunnerConfig::with_timeout(ExecutionTimeout::from_secs(self.runner.timeout_secs));
        config.dry_run = self.runner.dry_run;
        if let Some(ref program) = self.runner.program {
            config = config.interpreter(Interpreter {
                program: program.clone(),
                args: self.runner.args.clone().unwrap_or_default(),
            });
        }
        config
    }

    /// Audit sink described by the `[audit]` section
    pub fn audit_sink(&self) -> Result<Arc<dyn AuditSink>> {
        if self.audit.sink.eq_ignore_ascii_case("file") {
            let path = self
                .audit
                .file_path
                .as_ref()
                .context("Audit sink 'file' requires audit.file_path")?;
            Ok(Arc::new(FileAuditSink::open(path)?))
        } else {
            Ok(Arc::new(TracingAuditSink))
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
