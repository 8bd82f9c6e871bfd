//! Verification results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Frame, ModerationDetail};

/// Counts of evidence items that were dropped during extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DegradationReport {
    pub failed_clips: u32,
    pub failed_frames: u32,
    pub failed_transcriptions: u32,
    /// Document extraction produced no text
    pub empty_text: bool,
}

impl DegradationReport {
    pub fn is_degraded(&self) -> bool {
        self.failed_clips > 0
            || self.failed_frames > 0
            || self.failed_transcriptions > 0
            || self.empty_text
    }
}

/// Terminal artifact of a verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub approved: bool,
    pub moderation_detail: ModerationDetail,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<Frame>>,
    #[serde(default)]
    pub degradation: DegradationReport,
}
