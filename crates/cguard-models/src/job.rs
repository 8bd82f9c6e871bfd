//! Verification job definitions.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a verification job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of content submitted for verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Video,
    Audio,
    Book,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Book => "book",
        }
    }

    /// Whether a mime type is acceptable for this content type.
    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        let mime = mime_type.trim().to_ascii_lowercase();
        match self {
            ContentType::Video => mime.starts_with("video/"),
            ContentType::Audio => mime.starts_with("audio/"),
            ContentType::Book => mime == "application/pdf" || mime == "application/epub+zip",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown content type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown content type: {0}")]
pub struct InvalidContentType(pub String);

impl FromStr for ContentType {
    type Err = InvalidContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(ContentType::Video),
            "audio" => Ok(ContentType::Audio),
            "book" => Ok(ContentType::Book),
            other => Err(InvalidContentType(other.to_string())),
        }
    }
}

/// Cover image submitted alongside the content.
#[derive(Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// A single verification request.
///
/// Immutable once built. The pipeline borrows the file bytes for the duration
/// of one run; nothing outlives the run except the result.
#[derive(Clone)]
pub struct VerificationJob {
    job_id: JobId,
    file_bytes: Vec<u8>,
    mime_type: String,
    content_type: ContentType,
    title: String,
    description: Option<String>,
    thumbnail: Option<Thumbnail>,
    language_hint: Option<String>,
}

impl VerificationJob {
    /// Create a job with a fresh ID.
    pub fn new(
        content_type: ContentType,
        mime_type: impl Into<String>,
        file_bytes: Vec<u8>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            file_bytes,
            mime_type: mime_type.into(),
            content_type,
            title: title.into(),
            description: None,
            thumbnail: None,
            language_hint: None,
        }
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_thumbnail(mut self, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        self.thumbnail = Some(Thumbnail {
            bytes,
            mime_type: mime_type.into(),
        });
        self
    }

    /// Language hint forwarded to transcription (e.g. "en").
    pub fn with_language_hint(mut self, language: impl Into<String>) -> Self {
        self.language_hint = Some(language.into());
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn file_bytes(&self) -> &[u8] {
        &self.file_bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&Thumbnail> {
        self.thumbnail.as_ref()
    }

    pub fn language_hint(&self) -> Option<&str> {
        self.language_hint.as_deref()
    }

    /// File extension used when staging the input for ffmpeg.
    pub fn input_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

impl fmt::Debug for VerificationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationJob")
            .field("job_id", &self.job_id)
            .field("content_type", &self.content_type)
            .field("mime_type", &self.mime_type)
            .field("len", &self.file_bytes.len())
            .field("title", &self.title)
            .field("has_thumbnail", &self.thumbnail.is_some())
            .finish()
    }
}

/// Map a mime type to the extension ffmpeg expects for demuxer detection.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/x-msvideo" => "avi",
        "video/mpeg" => "mpg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/aac" => "aac",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
        "audio/webm" => "webm",
        "application/pdf" => "pdf",
        "application/epub+zip" => "epub",
        _ => "bin",
    }
}
