//! Clients for the external transcription and moderation services.
//!
//! The pipeline depends only on the [`Transcriber`] and [`Moderator`] traits;
//! the HTTP implementations here talk JSON to the deployed services.

pub mod error;
pub mod moderation;
pub mod retry;
pub mod transcription;

pub use error::{ClientError, ClientResult};
pub use moderation::{HttpModerator, ModerationConfig, Moderator};
pub use retry::RetryPolicy;
pub use transcription::{HttpTranscriber, TranscriptionConfig, Transcriber};
