//! Structured job logging utilities.

use tracing::{error, info, warn, Span};

use cguard_models::{ContentType, JobId, Stage};

/// Logs job lifecycle events with the job ID and content type attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    content_type: ContentType,
}

impl JobLogger {
    pub fn new(job_id: &JobId, content_type: ContentType) -> Self {
        Self {
            job_id: job_id.to_string(),
            content_type,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            content_type = %self.content_type,
            "Job started: {}", message
        );
    }

    pub fn log_stage(&self, stage: Stage, message: &str) {
        info!(
            job_id = %self.job_id,
            content_type = %self.content_type,
            stage = stage.as_str(),
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            content_type = %self.content_type,
            "Job warning: {}", message
        );
    }

    /// Log a fatal error with its stable kind.
    pub fn log_error(&self, kind: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            content_type = %self.content_type,
            kind,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, approved: bool, degraded: bool) {
        info!(
            job_id = %self.job_id,
            content_type = %self.content_type,
            approved,
            degraded,
            "Job completed"
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span covering one verification run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "verify",
            job_id = %self.job_id,
            content_type = %self.content_type
        )
    }
}
