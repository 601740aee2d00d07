//! Error types for the gatekeeper queue.

use thiserror::Error;

/// Boxed error returned by a failing command action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single command action.
pub type CommandResult = Result<(), BoxError>;

/// Errors surfaced by a drain step.
#[derive(Debug, Error)]
pub enum GatekeeperError {
    /// The command's action returned an error.
    #[error("Command failed in queue '{queue}': {source}")]
    Command {
        queue: String,
        #[source]
        source: BoxError,
    },

    /// The command's pause could not be resolved to an instant.
    #[error("Invalid pause in queue '{queue}': {source}")]
    Pause {
        queue: String,
        #[source]
        source: PauseError,
    },

    /// No tokio runtime is available to host timers.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatekeeperError {
    /// Whether the error came from the command's own action.
    pub fn is_command_failure(&self) -> bool {
        matches!(self, GatekeeperError::Command { .. })
    }
}

/// Result type for gatekeeper operations.
pub type GatekeeperResult<T> = Result<T, GatekeeperError>;

/// Errors raised while resolving a pause specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PauseError {
    /// The specification was empty.
    #[error("Pause specification is empty")]
    Empty,

    /// The specification matched none of the recognized forms.
    #[error("Unrecognized pause specification: {0}")]
    Unrecognized(String),

    /// The specification described a negative span.
    #[error("Pause cannot be negative: {0}")]
    Negative(String),

    /// The specification overflowed the representable range.
    #[error("Pause out of range: {0}")]
    OutOfRange(String),
}
