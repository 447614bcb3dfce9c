//! Audit Trail
//!
//! Append-only structured records of every tool execution attempt. Each
//! record is a flat JSON object: `event`, `timestamp` (Unix millis) and the
//! event's fields.
//!
//! The gateway holds an injected [`AuditSink`] rather than a global logger,
//! so tests can swap in [`MemoryAuditSink`]. Sinks never fail the caller:
//! a record that cannot be formatted or written degrades to a plain log line.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

/// Required parameter missing or invalid
pub const EVENT_VALIDATION_ERROR: &str = "tool_validation_error";
/// Batch rejected by the allowlist
pub const EVENT_EXECUTION_BLOCKED: &str = "tool_execution_blocked";
/// Batch handed to the runner
pub const EVENT_EXECUTION_STARTED: &str = "tool_execution_started";
/// Runner returned a result
pub const EVENT_EXECUTION_COMPLETED: &str = "tool_execution_completed";
/// Runner failed to produce a result
pub const EVENT_EXECUTION_ERROR: &str = "tool_execution_error";

/// Maximum characters of stdout/stderr copied into a preview
pub const PREVIEW_CHARS: usize = 200;

/// Marker appended to a preview that was cut short
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Keys owned by the record envelope
const RESERVED_KEYS: [&str; 2] = ["event", "timestamp"];

/// Free-form fields of an audit record
pub type AuditFields = Map<String, Value>;

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event: String,

    /// Unix timestamp in milliseconds
    pub timestamp: i64,

    #[serde(flatten)]
    pub fields: AuditFields,
}

impl AuditEvent {
    /// Create a record stamped with the current time
    ///
    /// Fields named `event` or `timestamp` are dropped; the envelope owns them.
    pub fn new(event: impl Into<String>, mut fields: AuditFields) -> Self {
        for key in RESERVED_KEYS {
            fields.remove(key);
        }
        Self {
            event: event.into(),
            timestamp: Utc::now().timestamp_millis(),
            fields,
        }
    }

    /// Look up a field by key
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a string field by key
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Destination for audit records
pub trait AuditSink: Send + Sync {
    /// Append one record. Must not panic or block for long.
    fn record(&self, event: AuditEvent);
}

/// Build and record an event in one step
pub fn emit(sink: &dyn AuditSink, event: &str, fields: AuditFields) {
    sink.record(AuditEvent::new(event, fields));
}

/// Shorten text for operator-facing previews
///
/// Text longer than [`PREVIEW_CHARS`] characters is cut and suffixed with
/// [`TRUNCATION_MARKER`].
pub fn preview(text: &str) -> String {
    let mut chars = text.char_indices();
    match chars.nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

fn fallback_line(event: &AuditEvent) -> String {
    format!("AUDIT: event={}, fields={:?}", event.event, event.fields)
}

/// Writes records as JSON lines through `tracing` with target `audit`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match event.to_json_line() {
            Ok(line) => info!(target: "audit", "{}", line),
            Err(e) => {
                error!(target: "audit", "Failed to serialize audit record: {}", e);
                info!(target: "audit", "{}", fallback_line(&event));
            }
        }
    }
}

/// Appends records as JSON lines to a file
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Open (or create) the audit file in append mode
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory {:?}", parent)
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open audit log {:?}", path))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the audit file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) {
        let line = match event.to_json_line() {
            Ok(line) => line,
            Err(e) => {
                error!(target: "audit", "Failed to serialize audit record: {}", e);
                info!(target: "audit", "{}", fallback_line(&event));
                return;
            }
        };

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(file, "{}", line) {
            warn!(target: "audit", "Failed to write audit record to {:?}: {}", self.path, e);
            info!(target: "audit", "{}", line);
        }
    }
}

/// Keeps records in memory, for tests and embedding callers
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, in emission order
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records with the given event name, in emission order
    pub fn events_named(&self, name: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == name)
            .collect()
    }

    /// Number of records with the given event name
    pub fn count(&self, name: &str) -> usize {
        self.events_named(name).len()
    }

    /// Event names, in emission order
    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> AuditFields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = AuditEvent::new(
            EVENT_EXECUTION_BLOCKED,
            fields(json!({"tool": "test.tool", "command": "format C:"})),
        );

        let parsed: Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(parsed["event"], "tool_execution_blocked");
        assert_eq!(parsed["tool"], "test.tool");
        assert_eq!(parsed["command"], "format C:");
        assert!(parsed["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_reserved_keys_are_dropped() {
        let event = AuditEvent::new(
            "custom",
            fields(json!({"event": "spoofed", "timestamp": 1, "tool": "x"})),
        );

        assert_eq!(event.event, "custom");
        assert!(event.field("event").is_none());
        assert!(event.field("timestamp").is_none());
        assert_eq!(event.str_field("tool"), Some("x"));

        let parsed: Value = serde_json::from_str(&event.to_json_line().unwrap()).unwrap();
        assert_eq!(parsed["event"], "custom");
    }

    #[test]
    fn test_event_round_trips_through_json() {
        let event = AuditEvent::new("x", fields(json!({"exit_code": 0, "success": true})));
        let line = event.to_json_line().unwrap();
        let back: AuditEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview(""), "");
        assert_eq!(preview("hello"), "hello");

        let exact = "a".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "b".repeat(PREVIEW_CHARS + 50);
        let result = preview(&long);

        assert!(result.ends_with(TRUNCATION_MARKER));
        assert_eq!(result.len(), PREVIEW_CHARS + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let long = "é".repeat(PREVIEW_CHARS + 1);
        let result = preview(&long);

        let kept = result.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(kept.chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemoryAuditSink::new();
        emit(&sink, EVENT_EXECUTION_STARTED, AuditFields::new());
        emit(&sink, EVENT_EXECUTION_COMPLETED, AuditFields::new());
        emit(&sink, EVENT_EXECUTION_STARTED, AuditFields::new());

        assert_eq!(
            sink.event_names(),
            vec![
                EVENT_EXECUTION_STARTED,
                EVENT_EXECUTION_COMPLETED,
                EVENT_EXECUTION_STARTED
            ]
        );
        assert_eq!(sink.count(EVENT_EXECUTION_STARTED), 2);
        assert_eq!(sink.count(EVENT_EXECUTION_ERROR), 0);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");

        let sink = FileAuditSink::open(&path).unwrap();
        assert_eq!(sink.path(), path.as_path());
        emit(&sink, EVENT_EXECUTION_STARTED, fields(json!({"tool": "a"})));
        emit(&sink, EVENT_EXECUTION_COMPLETED, fields(json!({"tool": "a"})));
        drop(sink);

        // Reopening appends rather than truncating
        let sink = FileAuditSink::open(&path).unwrap();
        emit(&sink, EVENT_EXECUTION_ERROR, fields(json!({"tool": "b"})));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);

        let last: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(last["event"], EVENT_EXECUTION_ERROR);
        assert_eq!(last["tool"], "b");
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        let sink = TracingAuditSink;
        emit(&sink, EVENT_VALIDATION_ERROR, fields(json!({"missing_field": "name"})));
    }
}
