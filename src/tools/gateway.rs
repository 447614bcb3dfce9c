//! Execution Gateway
//!
//! The shared protocol every command-backed tool goes through:
//!
//! 1. Required parameters present and non-null, then declared constraints
//! 2. Every generated command approved by the allowlist
//! 3. `tool_execution_started` audit record
//! 4. Batch handed to the runner
//! 5. `tool_execution_completed` (or `tool_execution_error`) audit record
//!
//! Validation and policy failures are returned as [`ToolError`] before
//! anything runs. Once a batch reaches the runner, every outcome is an
//! [`ExecuteResult`], including runner infrastructure failures.

use super::error::ToolError;
use super::policy::Allowlist;
use super::result::{new_execution_id, ExecuteResult, ExecutionContext};
use super::runner::CommandRunner;
use super::schema::ParameterSchema;
use crate::audit::{
    self, AuditFields, AuditSink, EVENT_EXECUTION_BLOCKED, EVENT_EXECUTION_COMPLETED,
    EVENT_EXECUTION_ERROR, EVENT_EXECUTION_STARTED, EVENT_VALIDATION_ERROR,
};
use crate::metrics;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runner, policy and audit sink shared by the tools built on them
///
/// Cloning is cheap; clones share the same runner and sink.
#[derive(Clone)]
pub struct Gateway {
    runner: Arc<dyn CommandRunner>,
    policy: Allowlist,
    audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("policy", &self.policy)
            .field("dry_run", &self.runner.is_dry_run())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn new(runner: Arc<dyn CommandRunner>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            runner,
            policy: Allowlist::new(),
            audit,
        }
    }

    /// The allowlist applied to every batch
    pub fn policy(&self) -> &Allowlist {
        &self.policy
    }

    /// Whether the underlying runner is in dry-run mode
    pub fn is_dry_run(&self) -> bool {
        self.runner.is_dry_run()
    }

    /// Check arguments against a tool's parameter schema
    ///
    /// Required fields are checked first, in declaration order. Arguments
    /// that are not a JSON object are treated as having no fields.
    pub fn validate(
        &self,
        tool: &str,
        schema: &ParameterSchema,
        args: &Value,
    ) -> Result<(), ToolError> {
        for field in schema.required_fields() {
            let present = matches!(args.get(field), Some(value) if !value.is_null());
            if !present {
                return Err(self.report(
                    ToolError::MissingField {
                        tool: tool.to_string(),
                        field: field.to_string(),
                    },
                    args,
                ));
            }
        }

        if let Err(violation) = schema.check(args) {
            return Err(self.report(
                ToolError::InvalidField {
                    tool: tool.to_string(),
                    field: violation.field,
                    reason: violation.reason,
                },
                args,
            ));
        }

        Ok(())
    }

    /// Reject the batch if any command's verb is not approved
    ///
    /// Stops at the first rejected command and records one
    /// `tool_execution_blocked` event for it.
    pub fn check_policy(&self, tool: &str, commands: &[String]) -> Result<(), ToolError> {
        if let Some(command) = commands.iter().find(|c| !self.policy.is_allowed(c)) {
            return Err(self.report(
                ToolError::PolicyViolation {
                    tool: tool.to_string(),
                    command: command.clone(),
                },
                &Value::Null,
            ));
        }
        Ok(())
    }

    /// Record the audit event and metric for a rejected invocation
    ///
    /// Returns the error unchanged so callers can write
    /// `return Err(gateway.report(err, args))`.
    pub fn report(&self, error: ToolError, args: &Value) -> ToolError {
        match &error {
            ToolError::MissingField { tool, field } => {
                warn!(tool = %tool, field = %field, "Required field missing");
                metrics::record_validation_error(tool);
                self.emit(
                    EVENT_VALIDATION_ERROR,
                    fields(json!({
                        "tool": tool,
                        "missing_field": field,
                        "provided_fields": provided_fields(args),
                    })),
                );
            }
            ToolError::InvalidField { tool, field, reason } => {
                warn!(tool = %tool, field = %field, "Invalid field: {}", reason);
                metrics::record_validation_error(tool);
                self.emit(
                    EVENT_VALIDATION_ERROR,
                    fields(json!({
                        "tool": tool,
                        "invalid_field": field,
                        "reason": reason,
                        "provided_fields": provided_fields(args),
                    })),
                );
            }
            ToolError::PolicyViolation { tool, command } => {
                warn!(tool = %tool, "Command blocked by allowlist: {}", command);
                metrics::record_blocked(tool);
                self.emit(
                    EVENT_EXECUTION_BLOCKED,
                    fields(json!({
                        "tool": tool,
                        "command": command,
                    })),
                );
            }
        }
        error
    }

    /// Policy-check, run and audit one batch on behalf of `tool`
    ///
    /// `audit_extra` is merged into the started and completed records; its
    /// values win on key collisions.
    pub async fn run_commands(
        &self,
        tool: &str,
        commands: &[String],
        context: &ExecutionContext,
        audit_extra: AuditFields,
    ) -> Result<ExecuteResult, ToolError> {
        self.check_policy(tool, commands)?;

        let mut started = context_fields(tool, context);
        started.insert("commands".to_string(), json!(commands));
        started.insert("command_count".to_string(), json!(commands.len()));
        started.insert("dry_run".to_string(), json!(self.runner.is_dry_run()));
        merge(&mut started, &audit_extra);
        self.emit(EVENT_EXECUTION_STARTED, started);

        debug!(
            tool,
            correlation_id = %context.correlation_id,
            "Running {} command(s)",
            commands.len()
        );

        match self.runner.run(commands).await {
            Ok(result) => {
                let mut completed = context_fields(tool, context);
                completed.insert("execution_id".to_string(), json!(result.execution_id));
                completed.insert("exit_code".to_string(), json!(result.exit_code));
                completed.insert("status".to_string(), json!(result.status));
                completed.insert("success".to_string(), json!(result.is_success()));
                completed.insert("stdout_len".to_string(), json!(result.stdout.len()));
                completed.insert("stderr_len".to_string(), json!(result.stderr.len()));
                if !result.stdout.is_empty() {
                    completed.insert(
                        "stdout_preview".to_string(),
                        json!(audit::preview(&result.stdout)),
                    );
                }
                if !result.stderr.is_empty() {
                    completed.insert(
                        "stderr_preview".to_string(),
                        json!(audit::preview(&result.stderr)),
                    );
                }
                merge(&mut completed, &audit_extra);
                self.emit(EVENT_EXECUTION_COMPLETED, completed);

                metrics::record_execution(tool, &result.status.to_string());
                info!(
                    tool,
                    execution_id = %result.execution_id,
                    "Tool execution finished: {}",
                    result.summary()
                );
                Ok(result)
            }
            Err(e) => {
                warn!(tool, "Tool execution failed: {:#}", e);
                let mut errored = context_fields(tool, context);
                errored.insert("error".to_string(), json!(e.to_string()));
                self.emit(EVENT_EXECUTION_ERROR, errored);

                let result = ExecuteResult::error(
                    new_execution_id(),
                    String::new(),
                    format!("Tool execution failed: {}", e),
                );
                metrics::record_execution(tool, &result.status.to_string());
                Ok(result)
            }
        }
    }

    fn emit(&self, event: &str, fields: AuditFields) {
        audit::emit(self.audit.as_ref(), event, fields);
    }
}

fn provided_fields(args: &Value) -> Vec<String> {
    match args.as_object() {
        Some(map) => map.keys().cloned().collect(),
        None => Vec::new(),
    }
}

fn context_fields(tool: &str, context: &ExecutionContext) -> AuditFields {
    fields(json!({
        "tool": tool,
        "user_id": context.user_id,
        "asset_id": context.asset_id,
        "correlation_id": context.correlation_id,
    }))
}

fn fields(value: Value) -> AuditFields {
    match value {
        Value::Object(map) => map,
        _ => AuditFields::new(),
    }
}

fn merge(target: &mut AuditFields, extra: &AuditFields) {
    for (key, value) in extra {
        target.insert(key.clone(), value.clone());
    }
}
