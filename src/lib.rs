//! OpsGate
//!
//! Audited execution gateway for administrative commands: a tool registry,
//! an allowlist command policy, an interpreter process runner with timeouts,
//! and a structured audit trail around every execution.

pub mod audit;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod tools;
