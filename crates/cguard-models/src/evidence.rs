//! Evidence extracted from content and the collaborator payloads built from it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ContentType;

/// Build a `data:` URI for inline image payloads.
pub fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes))
}

/// A window of the source recording selected for audio extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipWindow {
    pub offset_seconds: f64,
    pub length_seconds: f64,
}

impl ClipWindow {
    pub fn new(offset_seconds: f64, length_seconds: f64) -> Self {
        Self {
            offset_seconds,
            length_seconds,
        }
    }
}

/// A short audio clip cut from the source.
#[derive(Clone)]
pub struct AudioSample {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub offset_seconds: f64,
    pub duration_seconds: f64,
}

impl std::fmt::Debug for AudioSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSample")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("offset_seconds", &self.offset_seconds)
            .field("duration_seconds", &self.duration_seconds)
            .finish()
    }
}

/// A still frame, inline-encoded for the moderation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// `data:image/jpeg;base64,...`
    pub inline_image_data: String,
    pub timestamp_seconds: f64,
}

impl Frame {
    pub fn from_jpeg(bytes: &[u8], timestamp_seconds: f64) -> Self {
        Self {
            inline_image_data: data_uri("image/jpeg", bytes),
            timestamp_seconds,
        }
    }
}

/// Speech-to-text output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Everything the moderation collaborator gets to look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<Frame>>,
    /// Inline thumbnail image (`data:` URI)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub content_type: ContentType,
}

/// Detail returned alongside a moderation decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModerationDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub flagged_categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Moderation decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModerationVerdict {
    pub approved: bool,
    #[serde(default)]
    pub detail: ModerationDetail,
}
