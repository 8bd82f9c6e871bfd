//! Content verification pipeline.
//!
//! Takes an uploaded video, audio recording or book, extracts representative
//! evidence (audio transcripts, keyframes, document text) and asks the
//! moderation service for a verdict, reporting progress as it goes.

pub mod config;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod progress;

pub use config::VerifierConfig;
pub use error::{VerifyError, VerifyResult};
pub use executor::VerificationExecutor;
pub use extractor::{FfmpegExtractor, MediaExtractor, MediaScope};
pub use logging::JobLogger;
pub use pipeline::VerificationPipeline;
pub use progress::{
    ChannelProgressSink, NoopProgressSink, ProgressReporter, ProgressSink, RedisProgressSink,
};
