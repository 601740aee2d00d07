//! `check` subcommand handler.

use std::path::Path;

use gatekeeper_config::{Config, ConfigValidator};

/// Validate a loaded configuration and print the findings.
pub(crate) fn check_config(path: &Path, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config)?;

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error:   {}: {}", error.path, error.message);
    }

    if !result.is_valid() {
        return Err(format!(
            "{} has {} error(s)",
            path.display(),
            result.errors.len()
        )
        .into());
    }

    let queue = config
        .queue
        .as_ref()
        .map(|q| q.name.as_str())
        .unwrap_or("<generated>");
    println!(
        "{}: ok (queue {}, {} step(s))",
        path.display(),
        queue,
        config.steps.len()
    );
    Ok(())
}
