//! Builtin Windows Administration Catalog
//!
//! Command-template tools registered on top of the gateway. Each tool only
//! turns its arguments into a batch of PowerShell commands; validation,
//! policy, running and auditing are the gateway's job.
//!
//! String arguments are always embedded as PowerShell single-quoted
//! literals (see [`ps_quote`]).

mod apps;
mod files;
mod security;
mod system;

use crate::tools::{CommandTool, Gateway, RegistryError, ToolRegistry};
use std::sync::Arc;
use tracing::info;

/// Every builtin tool, bound to `gateway`
pub fn builtin_tools(gateway: &Gateway) -> Vec<CommandTool> {
    let mut tools = Vec::new();
    tools.extend(system::tools(gateway));
    tools.extend(apps::tools(gateway));
    tools.extend(security::tools(gateway));
    tools.extend(files::tools(gateway));
    tools
}

/// Register the builtin catalog
///
/// Stops at the first registration error; tools registered before it stay.
pub fn register_builtin(registry: &ToolRegistry, gateway: &Gateway) -> Result<(), RegistryError> {
    let tools = builtin_tools(gateway);
    let count = tools.len();
    for tool in tools {
        registry.register(Arc::new(tool))?;
    }
    info!(count, "Registered builtin tools");
    Ok(())
}

/// Quote a value as a PowerShell single-quoted string literal
///
/// Embedded single quotes are doubled, so the value cannot end the literal.
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::tools::{Allowlist, Platform, ProcessRunner, RunnerConfig, Tool};
    use serde_json::{json, Value};

    fn gateway() -> Gateway {
        Gateway::new(
            Arc::new(ProcessRunner::with_config(RunnerConfig::dry_run())),
            Arc::new(MemoryAuditSink::new()),
        )
    }

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote("Spooler"), "'Spooler'");
        assert_eq!(ps_quote("O'Brien"), "'O''Brien'");
        assert_eq!(ps_quote(""), "''");
        assert_eq!(ps_quote("'; Remove-Item C:\\ #"), "'''; Remove-Item C:\\ #'");
    }

    #[test]
    fn test_register_builtin() {
        let registry = ToolRegistry::new();
        register_builtin(&registry, &gateway()).unwrap();

        let names: Vec<String> = registry.list().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "apps.install",
                "apps.repair_teams",
                "files.backup_user_docs",
                "security.check_bitlocker",
                "security.quick_scan_defender",
                "system.clear_temp",
                "system.list_services",
                "system.reset_network",
                "system.restart_service",
            ]
        );
        // One alias on top of the nine names
        assert_eq!(registry.size(), 10);
        assert!(registry.get("system_reset_network").is_some());
    }

    #[test]
    fn test_register_builtin_twice_conflicts() {
        let registry = ToolRegistry::new();
        let gateway = gateway();
        register_builtin(&registry, &gateway).unwrap();
        assert!(register_builtin(&registry, &gateway).is_err());
        assert_eq!(registry.size(), 10);
    }

    #[test]
    fn test_builtin_tools_are_windows_only() {
        for tool in builtin_tools(&gateway()) {
            assert_eq!(tool.supported_platforms(), &[Platform::Windows], "{}", tool.name());
        }
    }

    #[test]
    fn test_builtin_plans_pass_allowlist() {
        let allowlist = Allowlist::new();
        let samples: Vec<Value> = vec![
            json!({}),
            json!({"name": "Spooler"}),
            json!({"name": "Example.App", "silent": false}),
            json!({"search": "win", "status": "Running", "limit": 5}),
            json!({"scanType": "FullScan"}),
            json!({"destZip": "D:\\backup.zip", "includeDownloads": true}),
        ];

        for tool in builtin_tools(&gateway()) {
            for args in &samples {
                // Plans that need a missing field are rejected by validation first
                let missing = tool
                    .parameter_schema()
                    .required_fields()
                    .iter()
                    .any(|f| args.get(*f).is_none());
                if missing || tool.parameter_schema().check(args).is_err() {
                    continue;
                }
                let plan = tool.plan(args).unwrap();
                assert!(!plan.commands.is_empty(), "{}", tool.name());
                for command in &plan.commands {
                    assert!(
                        allowlist.is_allowed(command),
                        "{} generated a blocked command: {}",
                        tool.name(),
                        command
                    );
                }
            }
        }
    }

    #[test]
    fn test_builtin_audit_fields_do_not_shadow_record_keys() {
        const RECORD_KEYS: &[&str] = &[
            "tool",
            "user_id",
            "asset_id",
            "correlation_id",
            "commands",
            "command_count",
            "dry_run",
            "execution_id",
            "exit_code",
            "status",
            "success",
            "stdout_len",
            "stderr_len",
            "stdout_preview",
            "stderr_preview",
        ];
        let samples = [
            json!({"name": "Spooler"}),
            json!({"search": "win", "status": "Stopped"}),
            json!({"scanType": "QuickScan"}),
            json!({}),
        ];

        for tool in builtin_tools(&gateway()) {
            for args in &samples {
                let Ok(plan) = tool.plan(args) else { continue };
                for key in plan.audit_extra.keys() {
                    assert!(
                        !RECORD_KEYS.contains(&key.as_str()),
                        "{} shadows audit key {}",
                        tool.name(),
                        key
                    );
                }
            }
        }
    }

    #[test]
    fn test_confirmation_flags() {
        let registry = ToolRegistry::new();
        register_builtin(&registry, &gateway()).unwrap();

        let confirm = |name: &str| registry.get(name).unwrap().requires_confirmation();
        assert!(confirm("system.reset_network"));
        assert!(confirm("system.restart_service"));
        assert!(!confirm("system.list_services"));
        assert!(confirm("system.clear_temp"));
        assert!(confirm("apps.install"));
        assert!(!confirm("apps.repair_teams"));
        assert!(confirm("security.quick_scan_defender"));
        assert!(!confirm("security.check_bitlocker"));
        assert!(confirm("files.backup_user_docs"));
    }
}
