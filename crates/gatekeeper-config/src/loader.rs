//! Configuration loader.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}")?;
        let mut result = String::with_capacity(content.len());
        let mut last = 0;

        for cap in re.captures_iter(content) {
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let value = std::env::var(name.as_str())
                .map_err(|_| ConfigError::EnvVarNotSet(name.as_str().to_string()))?;
            result.push_str(&content[last..whole.start()]);
            result.push_str(&value);
            last = whole.end();
        }
        result.push_str(&content[last..]);

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.gatekeeper`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}
