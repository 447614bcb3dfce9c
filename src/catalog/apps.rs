//! Application install and repair.

use super::ps_quote;
use crate::tools::{
    arg_bool, arg_str, CommandPlan, CommandTool, Gateway, ParameterField, ParameterSchema,
    Platform, ToolError, ToolSpec,
};
use serde_json::Value;

pub(super) fn tools(gateway: &Gateway) -> Vec<CommandTool> {
    vec![
        CommandTool::new(
            ToolSpec::new(
                "apps.install",
                "Install applications using Windows Package Manager (winget)",
            )
            .schema(ParameterSchema::new(vec![
                ParameterField::string("name", "Id/name in Winget").required(),
                ParameterField::boolean("silent", true),
            ]))
            .requires_confirmation(true)
            .platforms(&[Platform::Windows]),
            gateway.clone(),
            install,
        ),
        CommandTool::new(
            ToolSpec::new(
                "apps.repair_teams",
                "Repair Microsoft Teams by killing processes and clearing cache",
            )
            .platforms(&[Platform::Windows]),
            gateway.clone(),
            repair_teams,
        ),
    ]
}

fn install(args: &Value) -> Result<CommandPlan, ToolError> {
    let name = arg_str(args, "name").unwrap_or_default();
    let silent = arg_bool(args, "silent", true);

    let mut command = format!(
        "winget install --accept-source-agreements --accept-package-agreements {}",
        ps_quote(name)
    );
    if silent {
        command.push_str(" --silent");
    }

    Ok(CommandPlan::new(vec![command])
        .with_field("packageName", name)
        .with_field("silent", silent))
}

fn repair_teams(_args: &Value) -> Result<CommandPlan, ToolError> {
    Ok(CommandPlan::new(vec![
        "taskkill /IM Teams.exe /F".to_string(),
        "Remove-Item -Recurse -Force -ErrorAction SilentlyContinue \"$env:APPDATA\\Microsoft\\Teams\""
            .to_string(),
        "Start-Process \"$env:LOCALAPPDATA\\Microsoft\\Teams\\Update.exe\" -ArgumentList '--processStart', 'Teams.exe'"
            .to_string(),
    ]))
}
