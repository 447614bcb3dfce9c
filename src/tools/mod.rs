//! Execution Gateway
//!
//! Every administrative operation runs through the same pipeline:
//! registry lookup, parameter validation, allowlist check, a single
//! interpreter process, and audit records at each transition.
//!
//! # Security Features
//!
//! - **Command Allowlist**: A batch runs only if every command's leading verb is approved
//! - **Fail Closed**: Empty or unrecognized commands are rejected
//! - **Timeout Enforcement**: Runaway processes are killed after a bounded wait
//! - **Audit Trail**: Validation, policy and execution outcomes are recorded
//!
//! # Architecture
//!
//! - `policy.rs`: Versioned command allowlist
//! - `runner.rs`: Interpreter process execution with timeout handling
//! - `timeout.rs`: Timeout management
//! - `schema.rs`: Declarative parameter schemas
//! - `gateway.rs`: Validate, policy-check, run and audit one batch
//! - `tool.rs`: Tool contract and the command-backed tool
//! - `registry.rs`: Concurrent name/alias registry
//!
//! # Example
//!
//! ```no_run
//! use opsgate::audit::TracingAuditSink;
//! use opsgate::tools::{
//!     CommandPlan, CommandTool, ExecutionContext, Gateway, Platform, ProcessRunner,
//!     RunnerConfig, Tool, ToolRegistry, ToolSpec,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = Arc::new(ProcessRunner::with_config(RunnerConfig::dry_run()));
//!     let gateway = Gateway::new(runner, Arc::new(TracingAuditSink));
//!
//!     let spec = ToolSpec::new("system.list_services", "List services")
//!         .platforms(&[Platform::Windows]);
//!     let tool = CommandTool::new(spec, gateway, |_| {
//!         Ok(CommandPlan::new(vec!["Get-Service".to_string()]))
//!     });
//!
//!     let registry = ToolRegistry::new();
//!     registry.register(Arc::new(tool))?;
//!
//!     if let Some(tool) = registry.get("system.list_services") {
//!         let ctx = ExecutionContext::with_generated_correlation("alice", "host-1");
//!         let result = tool.execute(&ctx, &json!({})).await?;
//!         println!("{}", result.summary());
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod gateway;
mod policy;
mod registry;
mod result;
mod runner;
mod schema;
mod timeout;
mod tool;

pub use error::{RegistryError, ToolError};
pub use gateway::Gateway;
pub use policy::{Allowlist, ALLOWED_COMMANDS, ALLOWLIST_VERSION};
pub use registry::ToolRegistry;
pub use result::{
    new_execution_id, ExecuteResult, ExecuteStatus, ExecutionContext, UNKNOWN_EXIT_CODE,
};
pub use runner::{
    join_commands, CommandRunner, Interpreter, ProcessRunner, RunnerConfig, COMMAND_SEPARATOR,
    DRY_RUN_MARKER,
};
pub use schema::{
    arg_bool, arg_i64, arg_str, FieldViolation, ParameterField, ParameterKind, ParameterSchema,
};
pub use timeout::{ExecutionTimeout, DEFAULT_TIMEOUT_SECS};
pub use tool::{CommandPlan, CommandTool, PlanBuilder, Platform, Tool, ToolSpec};
