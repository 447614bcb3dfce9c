//! Command Allowlist
//!
//! Decides whether a generated command may be handed to the runner. Only the
//! leading verb of a command is checked against a fixed table of approved
//! administrative verbs.
//!
//! # Policy Boundary
//!
//! 1. **Fail Closed**: empty or whitespace-only commands are rejected
//! 2. **Verb Only**: the first whitespace-delimited token is the only thing
//!    inspected; `;`, `&` and `|` are stripped from it before comparison
//! 3. **Case Sensitive**: `Get-Service` is approved, `get-service` is not
//!
//! Clauses chained after an approved verb (pipes, `&&`, `;`) are not
//! re-checked. Tightening that would change existing policy decisions, so it
//! is left for a product-level review of the table.

use std::collections::BTreeSet;

/// Version of the approved verb table. Bump when the table changes.
pub const ALLOWLIST_VERSION: u32 = 1;

/// Approved command verbs
pub const ALLOWED_COMMANDS: &[&str] = &[
    "ipconfig",
    "netsh",
    "Get-MpComputerStatus",
    "Start-MpScan",
    "winget",
    "Get-BitLockerVolume",
    "manage-bde",
    "Get-Service",
    "Restart-Service",
    "Stop-Process",
    "Start-Process",
    "Remove-Item",
    "Get-Process",
    "Get-ChildItem",
    "Compress-Archive",
    "Copy-Item",
    "New-Item",
    "Set-ExecutionPolicy",
    "taskkill",
    "Write-Host",
    "Get-WmiObject",
    "Get-Date",
    "Where-Object",
    "Select-Object",
    "ForEach-Object",
    "Start-Sleep",
];

/// Characters stripped from the leading token before lookup
const OPERATOR_CHARS: [char; 3] = [';', '&', '|'];

/// Allowlist policy over the static verb table
///
/// The policy holds no mutable state and can be shared freely between
/// concurrent executions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allowlist;

impl Allowlist {
    /// Create the allowlist over the built-in verb table
    pub fn new() -> Self {
        Self
    }

    /// Check whether a command's leading verb is approved
    ///
    /// # Example
    ///
    /// ```
    /// use opsgate::tools::Allowlist;
    ///
    /// let allowlist = Allowlist::new();
    /// assert!(allowlist.is_allowed("ipconfig /flushdns"));
    /// assert!(!allowlist.is_allowed("format C:"));
    /// ```
    pub fn is_allowed(&self, command: &str) -> bool {
        match leading_verb(command) {
            Some(verb) => ALLOWED_COMMANDS.contains(&verb.as_str()),
            None => false,
        }
    }

    /// Snapshot of the approved verbs
    pub fn allowed_commands(&self) -> BTreeSet<&'static str> {
        ALLOWED_COMMANDS.iter().copied().collect()
    }

    /// Version of the verb table this policy enforces
    pub fn version(&self) -> u32 {
        ALLOWLIST_VERSION
    }
}

/// Extract the cleaned leading token of a command, if any
fn leading_verb(command: &str) -> Option<String> {
    let first = command.split_whitespace().next()?;
    let cleaned: String = first.chars().filter(|c| !OPERATOR_CHARS.contains(c)).collect();
    Some(cleaned)
}
