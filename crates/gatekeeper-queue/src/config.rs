//! Configuration for a delay queue.

use serde::{Deserialize, Serialize};

/// Category tag attached to every timer a queue creates.
pub const DEFAULT_CATEGORY: &str = "gatekeeper";

/// What a queue does after a command or its pause fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the remaining commands dormant until the next enqueue.
    #[default]
    Stall,
    /// Report the error and keep draining.
    Continue,
}

/// Delay queue configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name, used as the label of created timers.
    #[serde(default = "default_name")]
    pub name: String,

    /// Category tag for created timers.
    #[serde(default = "default_category")]
    pub category: String,

    /// Behavior after a failed command.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_name() -> String {
    "gatekeeper".to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            category: default_category(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl QueueConfig {
    /// Create a config with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the timer category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}
