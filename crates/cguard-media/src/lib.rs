#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and document text extraction.
//!
//! This crate provides:
//! - A process runner that stages in-memory buffers through job-scoped scratch files
//! - Tool availability checks memoized per checker instance
//! - Resource-class pools bounding concurrent transcode/probe/transcribe work
//! - Duration probing with content-aware fallbacks
//! - Audio clip sampling and keyframe extraction
//! - PDF and EPUB text extraction

pub mod audio;
pub mod availability;
pub mod command;
pub mod document;
pub mod error;
pub mod frames;
pub mod metric_names;
pub mod pool;
pub mod probe;
pub mod runner;
pub mod scratch;

pub use audio::{extract_plan, extract_sample, select_sampling_plan, SampledAudio, CLIP_LENGTH_SECS};
pub use availability::{FfmpegAvailability, StaticAvailability, ToolAvailability};
pub use command::{FfmpegCommand, OutputMode, ToolCommand};
pub use document::{extract_text, TEXT_CAP_GENERAL, TEXT_CAP_MODERATION};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_frames, frame_timestamps, FrameSet, DEFAULT_FRAME_COUNT};
pub use pool::{PoolLimits, ResourceClass, ResourcePools};
pub use probe::{fallback_duration, probe_duration};
pub use runner::{wait_for_cancel, ProcessRunner, ScratchFile};
pub use scratch::{reap_stale, ScratchDir, ScratchWorkspace};
