//! Configuration errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Invalid substitution pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_not_set_error() {
        let err = ConfigError::EnvVarNotSet("TV_HOST".to_string());
        assert!(err.to_string().contains("TV_HOST"));
        assert!(err.to_string().contains("not set"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::from(io_err);
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_toml_error_from() {
        let toml_err = toml::from_str::<toml::Value>("steps = [").unwrap_err();
        let err = ConfigError::from(toml_err);
        assert!(err.to_string().starts_with("TOML parse error"));
    }
}
