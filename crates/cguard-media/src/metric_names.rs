//! Names of the metrics emitted from this crate.

pub const DEGRADED_EVIDENCE_TOTAL: &str = "cguard_degraded_evidence_total";
pub const TOOL_DURATION_SECONDS: &str = "cguard_tool_duration_seconds";
pub const SCRATCH_REAPED_TOTAL: &str = "cguard_scratch_reaped_total";
