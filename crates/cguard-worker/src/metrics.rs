//! Prometheus metrics for the verifier.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_STARTED_TOTAL: &str = "cguard_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "cguard_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "cguard_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "cguard_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "cguard_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "cguard_stage_duration_seconds";

    // Evidence metrics
    pub const TRANSCRIPTION_DURATION_SECONDS: &str = "cguard_transcription_duration_seconds";

    // Shared with cguard-media, which emits them directly
    pub use cguard_media::metric_names::{
        DEGRADED_EVIDENCE_TOTAL, SCRATCH_REAPED_TOTAL, TOOL_DURATION_SECONDS,
    };
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `addr`.
pub fn install_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_job_started(content_type: &str) {
    counter!(names::JOBS_STARTED_TOTAL, "content_type" => content_type.to_string()).increment(1);
}

/// Record a job that reached `done`.
pub fn record_job_completed(content_type: &str, approved: bool, duration_secs: f64) {
    let labels = [
        ("content_type", content_type.to_string()),
        ("approved", approved.to_string()),
    ];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "content_type" => content_type.to_string())
        .record(duration_secs);
}

/// Record a job that reached `error`.
pub fn record_job_failed(content_type: &str, kind: &str) {
    let labels = [
        ("content_type", content_type.to_string()),
        ("kind", kind.to_string()),
    ];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.to_string()).record(duration_secs);
}

/// Record dropped evidence items (`clip`, `frame`, `transcription`, `text`).
pub fn record_degraded(kind: &'static str, count: u64) {
    if count > 0 {
        counter!(names::DEGRADED_EVIDENCE_TOTAL, "kind" => kind).increment(count);
    }
}

pub fn record_transcription(success: bool, duration_secs: f64) {
    histogram!(
        names::TRANSCRIPTION_DURATION_SECONDS,
        "success" => success.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::names::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let all = [
            JOBS_STARTED_TOTAL,
            JOBS_COMPLETED_TOTAL,
            JOBS_FAILED_TOTAL,
            JOBS_IN_FLIGHT,
            JOB_DURATION_SECONDS,
            STAGE_DURATION_SECONDS,
            TRANSCRIPTION_DURATION_SECONDS,
            DEGRADED_EVIDENCE_TOTAL,
            TOOL_DURATION_SECONDS,
            SCRATCH_REAPED_TOTAL,
        ];
        assert!(all.iter().all(|name| name.starts_with("cguard_")));
        assert_eq!(all.iter().collect::<HashSet<_>>().len(), all.len());
        assert_eq!(DEGRADED_EVIDENCE_TOTAL, cguard_media::metric_names::DEGRADED_EVIDENCE_TOTAL);
    }
}
