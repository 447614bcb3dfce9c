// Prometheus metrics for gateway outcomes
//
// Counters:
// - Tool executions by tool and result status
// - Batches blocked by the allowlist
// - Invocations rejected by parameter validation

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref TOOL_EXECUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tool_executions_total", "Tool executions that reached the runner"),
        &["tool", "status"]
    ).expect("Failed to create tool executions metric");

    pub static ref TOOL_BLOCKED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tool_blocked_total", "Tool batches rejected by the command allowlist"),
        &["tool"]
    ).expect("Failed to create tool blocked metric");

    pub static ref TOOL_VALIDATION_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("tool_validation_errors_total", "Tool invocations rejected by parameter validation"),
        &["tool"]
    ).expect("Failed to create tool validation errors metric");
}

/// Register all metrics with [`REGISTRY`]
///
/// Safe to call more than once; repeated registrations are ignored.
pub fn init() -> prometheus::Result<()> {
    let collectors: [Box<dyn prometheus::core::Collector>; 3] = [
        Box::new(TOOL_EXECUTIONS_TOTAL.clone()),
        Box::new(TOOL_BLOCKED_TOTAL.clone()),
        Box::new(TOOL_VALIDATION_ERRORS_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

pub(crate) fn record_execution(tool: &str, status: &str) {
    TOOL_EXECUTIONS_TOTAL.with_label_values(&[tool, status]).inc();
}

pub(crate) fn record_blocked(tool: &str) {
    TOOL_BLOCKED_TOTAL.with_label_values(&[tool]).inc();
}

pub(crate) fn record_validation_error(tool: &str) {
    TOOL_VALIDATION_ERRORS_TOTAL.with_label_values(&[tool]).inc();
}

/// Gather all metrics in Prometheus text format
pub fn render() -> anyhow::Result<String> {
    init().map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
