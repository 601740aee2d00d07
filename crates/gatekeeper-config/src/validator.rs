//! Configuration validation.

use gatekeeper_queue::{Pause, QueueConfig};

use crate::error::ConfigError;
use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        if let Some(queue) = &config.queue {
            Self::validate_queue(queue, &mut result);
        }

        Self::validate_logging(config, &mut result);

        Self::validate_steps(config, &mut result);

        Ok(result)
    }

    fn validate_queue(queue: &QueueConfig, result: &mut ValidationResult) {
        if queue.name.trim().is_empty() {
            result.add_error(ValidationError::new("queue.name", "Queue name cannot be empty"));
        }

        if queue.category.trim().is_empty() {
            result.add_error(ValidationError::new(
                "queue.category",
                "Timer category cannot be empty",
            ));
        }
    }

    fn validate_logging(config: &Config, result: &mut ValidationResult) {
        if config.logging.level.trim().is_empty() {
            result.add_warning(ValidationWarning::new(
                "logging.level",
                "Log level is empty, falling back to RUST_LOG or \"info\"",
            ));
        }
    }

    fn validate_steps(config: &Config, result: &mut ValidationResult) {
        if config.steps.is_empty() {
            result.add_warning(ValidationWarning::new("steps", "No steps defined, nothing to run"));
        }

        for (index, step) in config.steps.iter().enumerate() {
            if step.command.trim().is_empty() {
                result.add_error(ValidationError::new(
                    format!("steps[{}].command", index),
                    "Command cannot be empty",
                ));
            }

            match Pause::parse(&step.pause) {
                Ok(pause) if pause.is_absolute() => {
                    result.add_warning(ValidationWarning::new(
                        format!("steps[{}].pause", index),
                        format!(
                            "Pause '{}' is an absolute time, the next step waits until it passes",
                            step.pause
                        ),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    result.add_error(ValidationError::new(
                        format!("steps[{}].pause", index),
                        e.to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
