//! Progress event types.
//!
//! Events are pushed to whatever sink the caller supplies (WebSocket bridge,
//! Redis pub/sub, in-process channel). They are never persisted.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::JobId;

/// Named step of the verification state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Validating,
    Sampling,
    Transcribing,
    FramesReady,
    TextReady,
    Moderating,
    Done,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validating => "validating",
            Stage::Sampling => "sampling",
            Stage::Transcribing => "transcribing",
            Stage::FramesReady => "frames_ready",
            Stage::TextReady => "text_ready",
            Stage::Moderating => "moderating",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }

    /// Percent reported when the stage is entered.
    pub fn base_percent(&self) -> u8 {
        match self {
            Stage::Received => 10,
            Stage::Validating => 20,
            Stage::Sampling => 30,
            Stage::Transcribing => 50,
            Stage::FramesReady | Stage::TextReady => 70,
            Stage::Moderating => 75,
            Stage::Done => 100,
            // Error keeps whatever percent the run had reached.
            Stage::Error => 0,
        }
    }

    /// Position in the state machine. `FramesReady` and `TextReady` share a slot.
    pub fn rank(&self) -> u8 {
        match self {
            Stage::Received => 0,
            Stage::Validating => 1,
            Stage::Sampling => 2,
            Stage::Transcribing => 3,
            Stage::FramesReady | Stage::TextReady => 4,
            Stage::Moderating => 5,
            Stage::Done => 6,
            Stage::Error => 7,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }
}

/// A single progress update for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    /// 0-100, non-decreasing within a run
    pub percent: u8,
    pub stage: Stage,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(job_id: &JobId, stage: Stage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.clone(),
            percent: percent.min(100),
            stage,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
