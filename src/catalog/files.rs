//! User document backup.

use super::ps_quote;
use crate::tools::{
    arg_bool, arg_str, CommandPlan, CommandTool, Gateway, ParameterField, ParameterSchema,
    Platform, ToolError, ToolSpec,
};
use serde_json::Value;

const TOOL_NAME: &str = "files.backup_user_docs";
const DEFAULT_DEST_ZIP: &str = "C:\\Temp\\user-docs.zip";

/// Profile folders that can be included, with their defaults
const FOLDERS: [(&str, &str, bool); 3] = [
    ("includeDesktop", "Desktop", true),
    ("includeDocuments", "Documents", true),
    ("includeDownloads", "Downloads", false),
];

pub(super) fn tools(gateway: &Gateway) -> Vec<CommandTool> {
    let mut fields = vec![ParameterField::string("destZip", "Destination ZIP file path")
        .default_value(Value::String(DEFAULT_DEST_ZIP.to_string()))];
    for (param, _, default) in FOLDERS {
        fields.push(ParameterField::boolean(param, default));
    }

    vec![CommandTool::new(
        ToolSpec::new(TOOL_NAME, "Backup user documents to a ZIP file")
            .schema(ParameterSchema::new(fields))
            .requires_confirmation(true)
            .platforms(&[Platform::Windows]),
        gateway.clone(),
        backup_user_docs,
    )]
}

fn backup_user_docs(args: &Value) -> Result<CommandPlan, ToolError> {
    let dest_zip = arg_str(args, "destZip").unwrap_or(DEFAULT_DEST_ZIP);

    let mut plan = CommandPlan::default();
    let mut paths = Vec::new();
    for (param, folder, default) in FOLDERS {
        let included = arg_bool(args, param, default);
        if included {
            paths.push(format!("\"$env:USERPROFILE\\{}\"", folder));
        }
        plan = plan.with_field(param, included);
    }

    if paths.is_empty() {
        return Err(ToolError::InvalidField {
            tool: TOOL_NAME.to_string(),
            field: "includeDocuments".to_string(),
            reason: "at least one folder must be included".to_string(),
        });
    }

    plan.commands.push(format!(
        "Compress-Archive -Path {} -DestinationPath {} -Force",
        paths.join(", "),
        ps_quote(dest_zip)
    ));
    Ok(plan.with_field("destZip", dest_zip))
}
