//! Media extraction seam between the pipeline and ffmpeg.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use cguard_media::{
    extract_frames, extract_plan, probe_duration, FfmpegAvailability, FrameSet, MediaResult,
    ProcessRunner, ResourcePools, SampledAudio, ToolAvailability,
};
use cguard_models::{ClipWindow, ContentType};

/// Everything one extraction call needs to know about the running job.
#[derive(Clone)]
pub struct MediaScope<'a> {
    pub scratch_dir: &'a Path,
    pub input: &'a [u8],
    pub input_ext: &'a str,
    pub content_type: ContentType,
    pub cancel: watch::Receiver<bool>,
}

/// Extracts audio and visual evidence from media buffers.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fail with `ToolUnavailable` if the transcoder cannot run.
    async fn ensure_tools(&self) -> MediaResult<()>;

    async fn probe_duration(&self, scope: &MediaScope<'_>) -> MediaResult<f64>;

    async fn sample_audio(
        &self,
        scope: &MediaScope<'_>,
        plan: &[ClipWindow],
    ) -> MediaResult<SampledAudio>;

    async fn extract_frames(
        &self,
        scope: &MediaScope<'_>,
        frame_count: usize,
        duration: f64,
    ) -> MediaResult<FrameSet>;
}

/// [`MediaExtractor`] backed by the ffmpeg/ffprobe CLIs.
pub struct FfmpegExtractor {
    availability: Arc<dyn ToolAvailability>,
    pools: ResourcePools,
    tool_timeout: Duration,
}

impl FfmpegExtractor {
    pub fn new(
        availability: Arc<dyn ToolAvailability>,
        pools: ResourcePools,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            availability,
            pools,
            tool_timeout,
        }
    }

    /// Extractor with a fresh memoized PATH checker.
    pub fn with_defaults(pools: ResourcePools, tool_timeout: Duration) -> Self {
        Self::new(Arc::new(FfmpegAvailability::new()), pools, tool_timeout)
    }

    fn runner(&self, scope: &MediaScope<'_>) -> ProcessRunner {
        ProcessRunner::new(
            scope.scratch_dir,
            Arc::clone(&self.availability),
            self.pools.clone(),
        )
        .with_timeout(self.tool_timeout)
        .with_cancel(scope.cancel.clone())
    }
}

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    async fn ensure_tools(&self) -> MediaResult<()> {
        self.availability.check("ffmpeg").await
    }

    async fn probe_duration(&self, scope: &MediaScope<'_>) -> MediaResult<f64> {
        probe_duration(
            &self.runner(scope),
            scope.input,
            scope.input_ext,
            scope.content_type,
        )
        .await
    }

    async fn sample_audio(
        &self,
        scope: &MediaScope<'_>,
        plan: &[ClipWindow],
    ) -> MediaResult<SampledAudio> {
        extract_plan(&self.runner(scope), scope.input, scope.input_ext, plan).await
    }

    async fn extract_frames(
        &self,
        scope: &MediaScope<'_>,
        frame_count: usize,
        duration: f64,
    ) -> MediaResult<FrameSet> {
        extract_frames(
            &self.runner(scope),
            scope.input,
            scope.input_ext,
            frame_count,
            duration,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cguard_media::StaticAvailability;

    #[tokio::test]
    async fn test_ensure_tools_reports_unavailable() {
        let extractor = FfmpegExtractor::new(
            Arc::new(StaticAvailability::unavailable()),
            ResourcePools::default(),
            Duration::from_secs(5),
        );
        let err = extractor.ensure_tools().await.unwrap_err();
        assert!(err.is_tool_unavailable());
    }
}
