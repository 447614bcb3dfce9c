//! Network, service and temp-file maintenance.

use super::ps_quote;
use crate::tools::{
    arg_i64, arg_str, CommandPlan, CommandTool, Gateway, ParameterField, ParameterSchema,
    Platform, ToolError, ToolSpec,
};
use serde_json::Value;

const SERVICE_STATUSES: &[&str] = &["all", "Running", "Stopped", "Paused"];

pub(super) fn tools(gateway: &Gateway) -> Vec<CommandTool> {
    vec![
        CommandTool::new(
            ToolSpec::new(
                "system.reset_network",
                "Reset network configuration to resolve connectivity issues",
            )
            .alias("system_reset_network")
            .requires_confirmation(true)
            .platforms(&[Platform::Windows]),
            gateway.clone(),
            reset_network,
        ),
        CommandTool::new(
            ToolSpec::new("system.restart_service", "Restart a Windows service")
                .schema(ParameterSchema::new(vec![
                    ParameterField::string("name", "Service name").required(),
                    ParameterField::integer("timeoutSec", 0, 120, 30)
                        .describe("Seconds to wait for the service to report Running"),
                ]))
                .requires_confirmation(true)
                .platforms(&[Platform::Windows]),
            gateway.clone(),
            restart_service,
        ),
        CommandTool::new(
            ToolSpec::new("system.list_services", "List and search Windows services")
                .schema(ParameterSchema::new(vec![
                    ParameterField::string("search", "Substring of the service or display name"),
                    ParameterField::string_enum("status", SERVICE_STATUSES, Some("all")),
                    ParameterField::integer("limit", 1, 200, 50),
                ]))
                .platforms(&[Platform::Windows]),
            gateway.clone(),
            list_services,
        ),
        CommandTool::new(
            ToolSpec::new(
                "system.clear_temp",
                "Clear temporary files from system and user temp directories",
            )
            .requires_confirmation(true)
            .platforms(&[Platform::Windows]),
            gateway.clone(),
            clear_temp,
        ),
    ]
}

fn reset_network(_args: &Value) -> Result<CommandPlan, ToolError> {
    Ok(CommandPlan::new(vec![
        "ipconfig /flushdns".to_string(),
        "netsh winsock reset".to_string(),
        "netsh int ip reset".to_string(),
    ]))
}

fn restart_service(args: &Value) -> Result<CommandPlan, ToolError> {
    let name = arg_str(args, "name").unwrap_or_default();
    let timeout_sec = arg_i64(args, "timeoutSec", 30);
    let service = ps_quote(name);

    let mut commands = vec![
        format!("Write-Host {}", ps_quote(&format!("Restarting service {}", name))),
        format!(
            "Get-Service -Name {} | Select-Object Name, Status, StartType, DisplayName",
            service
        ),
        format!("Restart-Service -Name {} -Force -ErrorAction Stop", service),
    ];
    if timeout_sec > 0 {
        commands.push(format!(
            "Get-Service -Name {} | ForEach-Object {{ $_.WaitForStatus('Running', [TimeSpan]::FromSeconds({})) }}",
            service, timeout_sec
        ));
    }
    commands.push(format!(
        "Get-Service -Name {} | Select-Object Name, Status",
        service
    ));

    Ok(CommandPlan::new(commands)
        .with_field("serviceName", name)
        .with_field("timeoutSec", timeout_sec))
}

fn list_services(args: &Value) -> Result<CommandPlan, ToolError> {
    let search = arg_str(args, "search").unwrap_or_default();
    let status = arg_str(args, "status").unwrap_or("all");
    let limit = arg_i64(args, "limit", 50);

    let mut filters = Vec::new();
    if status != "all" {
        filters.push(format!("$_.Status -eq {}", ps_quote(status)));
    }
    if !search.is_empty() {
        let pattern = ps_quote(&format!("*{}*", search));
        filters.push(format!(
            "($_.Name -like {} -or $_.DisplayName -like {})",
            pattern, pattern
        ));
    }

    let mut command = "Get-Service".to_string();
    if !filters.is_empty() {
        command.push_str(&format!(" | Where-Object {{ {} }}", filters.join(" -and ")));
    }
    command.push_str(&format!(
        " | Select-Object -First {} Name, DisplayName, Status, StartType",
        limit
    ));

    Ok(CommandPlan::new(vec![command])
        .with_field("search", search)
        .with_field("statusFilter", status)
        .with_field("limit", limit))
}

fn clear_temp(_args: &Value) -> Result<CommandPlan, ToolError> {
    Ok(CommandPlan::new(vec![
        "Remove-Item -Recurse -Force -ErrorAction SilentlyContinue \"$env:TEMP\\*\"".to_string(),
        "Remove-Item -Recurse -Force -ErrorAction SilentlyContinue \"C:\\Windows\\Temp\\*\""
            .to_string(),
    ]))
}
