// OpsGate - Main Entry Point
//
// Command-line transport over the execution gateway:
// - Tool discovery (list, describe)
// - Allowlist inspection
// - Audited tool execution

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opsgate::catalog;
use opsgate::config::Config;
use opsgate::logging::LogLevel;
use opsgate::metrics;
use opsgate::tools::{
    Allowlist, ExecutionContext, Gateway, Platform, ProcessRunner, ToolRegistry,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Exit status for a non-success execution result
const EXIT_FAILURE: u8 = 1;
/// Exit status for rejected invocations (validation, policy, unknown tool)
const EXIT_REJECTED: u8 = 2;

/// OpsGate: audited execution gateway for administrative commands
#[derive(Parser, Debug)]
#[command(name = "opsgate")]
#[command(version)]
#[command(about = "Audited execution gateway for administrative commands", long_about = None)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered tools
    List,
    /// Show a tool's metadata and parameter schema
    Describe {
        /// Tool name or alias
        tool: String,
    },
    /// Print the approved command verbs
    Allowlist,
    /// Execute a tool
    Run {
        /// Tool name or alias
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,

        /// User on whose behalf the tool runs
        #[arg(long, default_value = "cli")]
        user: String,

        /// Target asset identifier
        #[arg(long, default_value = "localhost")]
        asset: String,

        /// Correlation id for the audit trail (generated when omitted)
        #[arg(long)]
        correlation_id: Option<String>,

        /// Do not spawn any process
        #[arg(long)]
        dry_run: bool,

        /// Confirm tools that require confirmation
        #[arg(long)]
        confirm: bool,

        /// Print the Prometheus counters to stderr afterwards
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if args.verbose {
        config.logging.level = LogLevel::Debug.to_string();
    }
    if matches!(args.command, Commands::Run { dry_run: true, .. }) {
        config.runner.dry_run = true;
    }

    config
        .logging_config()
        .init()
        .context("Failed to initialize logging")?;
    metrics::init().context("Failed to register metrics")?;

    let runner = Arc::new(ProcessRunner::with_config(config.runner_config()));
    let gateway = Gateway::new(runner, config.audit_sink()?);
    let registry = ToolRegistry::new();
    catalog::register_builtin(&registry, &gateway).context("Failed to register builtin tools")?;

    match args.command {
        Commands::List => {
            list_tools(&registry);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Describe { tool } => describe_tool(&registry, &tool),
        Commands::Allowlist => {
            print_allowlist(gateway.policy());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            tool,
            args: raw_args,
            user,
            asset,
            correlation_id,
            confirm,
            metrics: print_metrics,
            ..
        } => {
            let context = match correlation_id {
                Some(id) => ExecutionContext::new(user, asset, id),
                None => ExecutionContext::with_generated_correlation(user, asset),
            };
            let code =
                run_tool(&registry, &tool, &raw_args, &context, gateway.is_dry_run(), confirm)
                    .await?;
            if print_metrics {
                eprint!("{}", metrics::render()?);
            }
            Ok(code)
        }
    }
}

fn list_tools(registry: &ToolRegistry) {
    for tool in registry.list() {
        let aliases = if tool.aliases().is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", tool.aliases().join(", "))
        };
        let confirm = if tool.requires_confirmation() {
            " [confirm]"
        } else {
            ""
        };
        println!("{}{}{} - {}", tool.name(), aliases, confirm, tool.description());
    }
}

fn describe_tool(registry: &ToolRegistry, name: &str) -> Result<ExitCode> {
    let Some(tool) = registry.get(name) else {
        eprintln!("Unknown tool: {}", name);
        return Ok(ExitCode::from(EXIT_REJECTED));
    };

    let description = json!({
        "name": tool.name(),
        "description": tool.description(),
        "aliases": tool.aliases(),
        "requires_confirmation": tool.requires_confirmation(),
        "supported_platforms": tool.supported_platforms(),
        "parameters": tool.json_schema(),
    });
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(ExitCode::SUCCESS)
}

fn print_allowlist(policy: &Allowlist) {
    println!("# allowlist version {}", policy.version());
    for verb in policy.allowed_commands() {
        println!("{}", verb);
    }
}

async fn run_tool(
    registry: &ToolRegistry,
    name: &str,
    raw_args: &str,
    context: &ExecutionContext,
    dry_run: bool,
    confirm: bool,
) -> Result<ExitCode> {
    let Some(tool) = registry.get(name) else {
        eprintln!("Unknown tool: {}", name);
        return Ok(ExitCode::from(EXIT_REJECTED));
    };

    let args: Value = match serde_json::from_str(raw_args) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Invalid --args JSON: {}", e);
            return Ok(ExitCode::from(EXIT_REJECTED));
        }
    };

    if tool.requires_confirmation() && !confirm {
        eprintln!(
            "Tool '{}' requires confirmation; re-run with --confirm",
            tool.name()
        );
        return Ok(ExitCode::from(EXIT_REJECTED));
    }

    let supported = Platform::current()
        .map(|p| tool.supported_platforms().contains(&p))
        .unwrap_or(false);
    if !supported {
        if dry_run {
            warn!(tool = tool.name(), "Tool does not support this platform; dry run only");
        } else {
            eprintln!(
                "Tool '{}' supports only: {}",
                tool.name(),
                tool.supported_platforms()
                    .iter()
                    .map(Platform::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(ExitCode::from(EXIT_REJECTED));
        }
    }

    debug!(tool = tool.name(), correlation_id = %context.correlation_id, "Executing tool");
    match tool.execute(context, &args).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_FAILURE))
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::from(EXIT_REJECTED))
        }
    }
}
