//! Verification error types.

use std::time::Duration;

use thiserror::Error;

use cguard_media::MediaError;

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Job timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("Extraction degraded: {0}")]
    ExtractionDegraded(String),

    #[error("Moderation failed: {0}")]
    ModerationFailed(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn tool_failed(msg: impl Into<String>) -> Self {
        Self::ToolExecutionFailed(msg.into())
    }

    pub fn degraded(msg: impl Into<String>) -> Self {
        Self::ExtractionDegraded(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable error kind.
    ///
    /// Timeouts report as `tool_execution_failed`; use [`is_timeout`](Self::is_timeout)
    /// to tell them apart.
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyError::InvalidInput(_) => "invalid_input",
            VerifyError::ToolUnavailable(_) => "tool_unavailable",
            VerifyError::ToolExecutionFailed(_) | VerifyError::TimedOut(_) => {
                "tool_execution_failed"
            }
            VerifyError::ExtractionDegraded(_) => "extraction_degraded",
            VerifyError::ModerationFailed(_) => "moderation_failed",
            VerifyError::Cancelled => "cancelled",
            VerifyError::Internal(_) => "internal",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, VerifyError::TimedOut(_))
    }
}

impl From<MediaError> for VerifyError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::ToolUnavailable { .. } => VerifyError::ToolUnavailable(e.to_string()),
            MediaError::Timeout { .. } => VerifyError::ToolExecutionFailed(e.to_string()),
            MediaError::ToolFailed {
                ref stderr,
                exit_code,
                ..
            } => {
                let mut message = e.to_string();
                if let Some(code) = exit_code {
                    message.push_str(&format!(" (exit code {})", code));
                }
                if let Some(stderr) = stderr.as_deref().filter(|s| !s.is_empty()) {
                    message.push_str(&format!(": {}", stderr));
                }
                VerifyError::ToolExecutionFailed(message)
            }
            MediaError::Cancelled => VerifyError::Cancelled,
            MediaError::ResourceLimit(_) | MediaError::Io(_) => {
                VerifyError::Internal(e.to_string())
            }
        }
    }
}
