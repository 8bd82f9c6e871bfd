//! Shared data models for the content verification pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Verification jobs and content types
//! - Progress events and pipeline stages
//! - Extracted evidence (audio samples, frames) and collaborator payloads
//! - Verification results and degradation reports

pub mod evidence;
pub mod job;
pub mod progress;
pub mod result;

// Re-export common types
pub use evidence::{
    data_uri, AudioSample, ClipWindow, Frame, ModerationDetail, ModerationRequest,
    ModerationVerdict, Transcription,
};
pub use job::{
    extension_for_mime, ContentType, InvalidContentType, JobId, Thumbnail, VerificationJob,
};
pub use progress::{ProgressEvent, Stage};
pub use result::{DegradationReport, VerificationResult};
