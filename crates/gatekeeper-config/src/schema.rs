//! Configuration schema definitions.

use std::path::PathBuf;

use gatekeeper_queue::QueueConfig;
use serde::{Deserialize, Serialize};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Queue settings. Absent means the runner picks a generated name.
    #[serde(default)]
    pub queue: Option<QueueConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Commands to run through the queue, in order.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write a daily-rolling log file as well as the console.
    #[serde(default)]
    pub file: bool,

    /// Log directory. Setting it implies `file = true`.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
            dir: None,
        }
    }
}

impl LoggingConfig {
    /// Directory for the log file, if file logging is enabled.
    ///
    /// Falls back to `~/.gatekeeper/logs` when no directory is configured.
    pub fn log_dir(&self) -> Option<PathBuf> {
        match &self.dir {
            Some(dir) => Some(PathBuf::from(ConfigLoader::expand_path(dir))),
            None if self.file => Some(default_log_dir()),
            None => None,
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gatekeeper")
        .join("logs")
}

/// One queued shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Pause that follows the command, in the pause grammar.
    #[serde(default = "default_pause")]
    pub pause: String,

    /// Shell command line.
    pub command: String,
}

fn default_pause() -> String {
    "0s".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_queue::FailurePolicy;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.queue.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_step_pause_defaults_to_zero() {
        let step: StepConfig = toml::from_str(r#"command = "echo hi""#).unwrap();
        assert_eq!(step.pause, "0s");
        assert_eq!(step.command, "echo hi");
    }

    #[test]
    fn test_step_requires_command() {
        assert!(toml::from_str::<StepConfig>(r#"pause = "1s""#).is_err());
    }

    #[test]
    fn test_queue_section() {
        let config: Config = toml::from_str(
            r#"
            [queue]
            name = "tv"
            failure_policy = "continue"
            "#,
        )
        .unwrap();
        let queue = config.queue.unwrap();
        assert_eq!(queue.name, "tv");
        assert_eq!(queue.category, "gatekeeper");
        assert_eq!(queue.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn test_log_dir_disabled_by_default() {
        assert!(LoggingConfig::default().log_dir().is_none());
    }

    #[test]
    fn test_log_dir_default_location() {
        let logging = LoggingConfig {
            file: true,
            ..LoggingConfig::default()
        };
        let dir = logging.log_dir().unwrap();
        assert!(dir.ends_with(".gatekeeper/logs"));
    }

    #[test]
    fn test_log_dir_explicit() {
        let logging = LoggingConfig {
            dir: Some("/var/log/gatekeeper".to_string()),
            ..LoggingConfig::default()
        };
        assert_eq!(logging.log_dir(), Some(PathBuf::from("/var/log/gatekeeper")));
    }
}
