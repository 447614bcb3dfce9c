//! Gateway Error Types
//!
//! Errors a caller can receive from the gateway before any process is
//! spawned, and errors raised while registering tools.
//!
//! Execution failures (spawn, wait, timeout) are not represented here: they
//! are folded into an [`ExecuteResult`](super::ExecuteResult) with status
//! `ERROR` so callers always get one result shape once a batch is running.

/// Errors raised by a tool invocation before the runner is reached
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// A declared-required parameter is absent or null
    #[error("Required field missing: {field}")]
    MissingField { tool: String, field: String },

    /// A parameter is present but violates its declared constraints
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField {
        tool: String,
        field: String,
        reason: String,
    },

    /// A generated command's leading verb is not on the allowlist
    #[error("Command not allowed: {command}")]
    PolicyViolation { tool: String, command: String },
}

impl ToolError {
    /// Name of the tool the error was raised for
    pub fn tool(&self) -> &str {
        match self {
            ToolError::MissingField { tool, .. }
            | ToolError::InvalidField { tool, .. }
            | ToolError::PolicyViolation { tool, .. } => tool,
        }
    }

    /// True for parameter validation failures
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ToolError::MissingField { .. } | ToolError::InvalidField { .. }
        )
    }

    /// True when the batch was rejected by the command policy
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, ToolError::PolicyViolation { .. })
    }
}

/// Errors raised by [`ToolRegistry::register`](super::ToolRegistry::register)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool name cannot be empty")]
    EmptyName,

    #[error("Tool '{0}' declares no supported platforms")]
    NoPlatforms(String),

    #[error("Tool name '{0}' is already registered")]
    NameConflict(String),

    #[error("Tool alias '{0}' is already registered")]
    AliasConflict(String),
}
