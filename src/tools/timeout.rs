//! Execution Timeout Management
//!
//! Bounded waiting for subprocess completion.

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Default wall-clock bound for one runner invocation
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Execution timeout configuration
///
/// Timeouts are enforced so a hung command cannot block a caller
/// indefinitely. What happens on expiry (killing the process) is up to the
/// caller of [`ExecutionTimeout::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TIMEOUT_SECS)
    }
}

impl ExecutionTimeout {
    /// Create a new execution timeout
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use opsgate::tools::ExecutionTimeout;
    ///
    /// let timeout = ExecutionTimeout::new(Duration::from_secs(10));
    /// assert_eq!(timeout.duration(), Duration::from_secs(10));
    /// ```
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Create a timeout from seconds
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Create a timeout from milliseconds (fast test cycles)
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Get the timeout duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drive a future to completion within the timeout
    ///
    /// Returns `None` if the timeout expired first. The future is dropped in
    /// that case.
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        time::timeout(self.duration, future).await.ok()
    }
}
