//! Tool contract and the command-backed tool built on the gateway.

use super::error::ToolError;
use super::gateway::Gateway;
use super::result::{ExecuteResult, ExecutionContext};
use super::schema::ParameterSchema;
use crate::audit::AuditFields;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Operating system a tool can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Macos,
}

impl Platform {
    /// Platform of the running process, if it is one we know
    pub fn current() -> Option<Self> {
        if cfg!(target_os = "windows") {
            Some(Platform::Windows)
        } else if cfg!(target_os = "linux") {
            Some(Platform::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Platform::Macos)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
            Platform::Macos => write!(f, "macos"),
        }
    }
}

/// A named, schema-described administrative operation
#[async_trait]
pub trait Tool: Send + Sync {
    /// Canonical unique name, e.g. `system.restart_service`
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameter_schema(&self) -> &ParameterSchema;

    /// Whether an operator must confirm before this tool runs
    fn requires_confirmation(&self) -> bool;

    /// Must not be empty for a registrable tool
    fn supported_platforms(&self) -> &[Platform];

    /// Alternate lookup names
    fn aliases(&self) -> &[String] {
        &[]
    }

    /// Parameter schema as a JSON Schema object
    fn json_schema(&self) -> Value {
        self.parameter_schema().to_json_schema()
    }

    /// Run the tool with the given context and JSON arguments
    async fn execute(
        &self,
        context: &ExecutionContext,
        args: &Value,
    ) -> Result<ExecuteResult, ToolError>;
}

/// Static metadata of a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub schema: ParameterSchema,
    pub requires_confirmation: bool,
    pub platforms: Vec<Platform>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            aliases: Vec::new(),
            schema: ParameterSchema::empty(),
            requires_confirmation: false,
            platforms: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn schema(mut self, schema: ParameterSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn requires_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }

    pub fn platforms(mut self, platforms: &[Platform]) -> Self {
        self.platforms = platforms.to_vec();
        self
    }
}

/// Commands a tool wants to run, plus fields for its audit records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandPlan {
    pub commands: Vec<String>,
    pub audit_extra: AuditFields,
}

impl CommandPlan {
    pub fn new(commands: Vec<String>) -> Self {
        Self {
            commands,
            audit_extra: AuditFields::new(),
        }
    }

    /// Attach an audit field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.audit_extra.insert(key.into(), value.into());
        self
    }
}

/// Turns validated arguments into a command plan
pub type PlanBuilder = Arc<dyn Fn(&Value) -> Result<CommandPlan, ToolError> + Send + Sync>;

/// A tool whose work is a batch of interpreter commands
///
/// Execution validates arguments, builds the batch, then hands it to the
/// gateway for policy, audit and running.
#[derive(Clone)]
pub struct CommandTool {
    spec: ToolSpec,
    gateway: Gateway,
    build: PlanBuilder,
}

impl fmt::Debug for CommandTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandTool")
            .field("spec", &self.spec)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

impl CommandTool {
    pub fn new<F>(spec: ToolSpec, gateway: Gateway, build: F) -> Self
    where
        F: Fn(&Value) -> Result<CommandPlan, ToolError> + Send + Sync + 'static,
    {
        Self {
            spec,
            gateway,
            build: Arc::new(build),
        }
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Build the command plan without running it
    pub fn plan(&self, args: &Value) -> Result<CommandPlan, ToolError> {
        (self.build)(args)
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn parameter_schema(&self) -> &ParameterSchema {
        &self.spec.schema
    }

    fn requires_confirmation(&self) -> bool {
        self.spec.requires_confirmation
    }

    fn supported_platforms(&self) -> &[Platform] {
        &self.spec.platforms
    }

    fn aliases(&self) -> &[String] {
        &self.spec.aliases
    }

    async fn execute(
        &self,
        context: &ExecutionContext,
        args: &Value,
    ) -> Result<ExecuteResult, ToolError> {
        self.gateway
            .validate(&self.spec.name, &self.spec.schema, args)?;
        let plan = self
            .plan(args)
            .map_err(|e| self.gateway.report(e, args))?;
        self.gateway
            .run_commands(&self.spec.name, &plan.commands, context, plan.audit_extra)
            .await
    }
}
