//! Execution context and result types shared by runners, tools and callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Exit code used when no real exit status could be determined
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Outcome classification of a runner invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecuteStatus {
    /// Process ran to completion with exit code 0
    Success,

    /// Process ran to completion with a non-zero exit code
    Failure,

    /// Process could not be started, waited on, or timed out
    Error,
}

impl fmt::Display for ExecuteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteStatus::Success => write!(f, "SUCCESS"),
            ExecuteStatus::Failure => write!(f, "FAILURE"),
            ExecuteStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of one runner invocation
///
/// `stdout` and `stderr` hold the full captured text; only audit previews
/// are truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// Fresh identifier for this invocation
    pub execution_id: String,

    /// Process exit code, or [`UNKNOWN_EXIT_CODE`]
    pub exit_code: i32,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Outcome classification
    pub status: ExecuteStatus,
}

impl ExecuteResult {
    /// Build a result from a finished process, classifying by exit code
    pub fn completed(execution_id: String, exit_code: i32, stdout: String, stderr: String) -> Self {
        let status = if exit_code == 0 {
            ExecuteStatus::Success
        } else {
            ExecuteStatus::Failure
        };
        Self {
            execution_id,
            exit_code,
            stdout,
            stderr,
            status,
        }
    }

    /// Build an ERROR result (exit code -1)
    pub fn error(execution_id: String, stdout: String, stderr: impl Into<String>) -> Self {
        Self {
            execution_id,
            exit_code: UNKNOWN_EXIT_CODE,
            stdout,
            stderr: stderr.into(),
            status: ExecuteStatus::Error,
        }
    }

    /// True only when the status and the exit code agree on success
    pub fn is_success(&self) -> bool {
        self.status == ExecuteStatus::Success && self.exit_code == 0
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        match self.status {
            ExecuteStatus::Success => format!(
                "Success (exit code: {}, {} bytes output)",
                self.exit_code,
                self.stdout.len()
            ),
            ExecuteStatus::Failure => format!(
                "Failed (exit code: {}, {} bytes output)",
                self.exit_code,
                self.stdout.len() + self.stderr.len()
            ),
            ExecuteStatus::Error => format!("Error: {}", self.stderr.trim()),
        }
    }
}

/// Generate a fresh opaque execution identifier
pub fn new_execution_id() -> String {
    Uuid::new_v4().to_string()
}

/// Who is executing a tool, on what asset, for which logical request
///
/// Constructed by the caller and passed unchanged into every audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub user_id: String,
    pub asset_id: String,
    pub correlation_id: String,
}

impl ExecutionContext {
    pub fn new(
        user_id: impl Into<String>,
        asset_id: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            asset_id: asset_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Create a context with a freshly generated correlation id
    pub fn with_generated_correlation(
        user_id: impl Into<String>,
        asset_id: impl Into<String>,
    ) -> Self {
        Self::new(user_id, asset_id, Uuid::new_v4().to_string())
    }
}
