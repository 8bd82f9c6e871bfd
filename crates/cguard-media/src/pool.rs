//! Resource-class pools.
//!
//! Each class of work gets its own semaphore so transcoding, probing and
//! transcription can be tuned independently without touching call sites.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Kind of work a permit is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// ffmpeg decode/encode (audio clips, frames)
    Transcode,
    /// ffprobe metadata queries
    Probe,
    /// Calls to the speech-to-text collaborator
    Transcribe,
}

impl ResourceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Transcode => "transcode",
            ResourceClass::Probe => "probe",
            ResourceClass::Transcribe => "transcribe",
        }
    }
}

/// Concurrency limits per resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub transcode: usize,
    pub probe: usize,
    pub transcribe: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            transcode: 4,
            probe: 8,
            transcribe: 4,
        }
    }
}

/// Shared semaphores, cheap to clone.
#[derive(Debug, Clone)]
pub struct ResourcePools {
    transcode: Arc<Semaphore>,
    probe: Arc<Semaphore>,
    transcribe: Arc<Semaphore>,
}

impl ResourcePools {
    pub fn new(limits: PoolLimits) -> Self {
        Self {
            transcode: Arc::new(Semaphore::new(limits.transcode.max(1))),
            probe: Arc::new(Semaphore::new(limits.probe.max(1))),
            transcribe: Arc::new(Semaphore::new(limits.transcribe.max(1))),
        }
    }

    fn semaphore(&self, class: ResourceClass) -> &Arc<Semaphore> {
        match class {
            ResourceClass::Transcode => &self.transcode,
            ResourceClass::Probe => &self.probe,
            ResourceClass::Transcribe => &self.transcribe,
        }
    }

    /// Wait for a permit of the given class.
    pub async fn acquire(&self, class: ResourceClass) -> MediaResult<OwnedSemaphorePermit> {
        if self.available(class) == 0 {
            debug!(pool = class.as_str(), "Pool saturated, waiting for a permit");
        }
        self.semaphore(class)
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| MediaError::ResourceLimit(format!("{} pool closed", class.as_str())))
    }

    pub fn available(&self, class: ResourceClass) -> usize {
        self.semaphore(class).available_permits()
    }
}

impl Default for ResourcePools {
    fn default() -> Self {
        Self::new(PoolLimits::default())
    }
}
