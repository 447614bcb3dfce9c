//! Defender scans and BitLocker status.

use crate::tools::{
    arg_str, CommandPlan, CommandTool, Gateway, ParameterField, ParameterSchema, Platform,
    ToolError, ToolSpec,
};
use serde_json::Value;

const SCAN_TYPES: &[&str] = &["QuickScan", "FullScan"];

pub(super) fn tools(gateway: &Gateway) -> Vec<CommandTool> {
    vec![
        CommandTool::new(
            ToolSpec::new(
                "security.quick_scan_defender",
                "Perform quick or full scan using Windows Defender",
            )
            .schema(ParameterSchema::new(vec![ParameterField::string_enum(
                "scanType",
                SCAN_TYPES,
                Some("QuickScan"),
            )]))
            .requires_confirmation(true)
            .platforms(&[Platform::Windows]),
            gateway.clone(),
            quick_scan_defender,
        ),
        CommandTool::new(
            ToolSpec::new(
                "security.check_bitlocker",
                "Check BitLocker encryption status on all volumes",
            )
            .platforms(&[Platform::Windows]),
            gateway.clone(),
            check_bitlocker,
        ),
    ]
}

fn quick_scan_defender(args: &Value) -> Result<CommandPlan, ToolError> {
    // Restricted to SCAN_TYPES by the schema, so it is safe unquoted
    let scan_type = arg_str(args, "scanType").unwrap_or("QuickScan");

    Ok(CommandPlan::new(vec![
        "Get-MpComputerStatus".to_string(),
        format!("Start-MpScan -ScanType {}", scan_type),
    ])
    .with_field("scanType", scan_type))
}

fn check_bitlocker(_args: &Value) -> Result<CommandPlan, ToolError> {
    Ok(CommandPlan::new(vec![
        "Get-BitLockerVolume | Select-Object MountPoint, ProtectionStatus, VolumeStatus, EncryptionMethod, EncryptionPercentage"
            .to_string(),
    ]))
}
