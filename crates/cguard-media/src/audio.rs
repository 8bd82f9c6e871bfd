//! Audio clip sampling.
//!
//! Short recordings get one clip from the start. Longer ones add an end clip,
//! and recordings past three minutes add a middle clip as well, so content
//! that only shows up late is still heard by transcription.

use tracing::{debug, warn};

use cguard_models::{AudioSample, ClipWindow};

use crate::command::{FfmpegCommand, ToolCommand};
use crate::error::{MediaError, MediaResult};
use crate::metric_names;
use crate::runner::ProcessRunner;

/// Length of every sampled clip, in seconds.
pub const CLIP_LENGTH_SECS: f64 = 60.0;
/// Recordings up to this length get a single clip.
const SINGLE_CLIP_MAX_SECS: f64 = 120.0;
/// Recordings up to this length get start and end clips.
const TWO_CLIP_MAX_SECS: f64 = 180.0;

/// Speech-to-text friendly output: mono 16 kHz MP3.
const SAMPLE_RATE_HZ: u32 = 16_000;
const SAMPLE_BITRATE: &str = "64k";
const SAMPLE_MIME: &str = "audio/mpeg";

/// Choose the clips to extract for a recording of `total_seconds`.
pub fn select_sampling_plan(total_seconds: f64) -> Vec<ClipWindow> {
    let total = if total_seconds.is_finite() {
        total_seconds.max(0.0)
    } else {
        0.0
    };
    let end_offset = (total - CLIP_LENGTH_SECS).max(0.0);

    if total <= SINGLE_CLIP_MAX_SECS {
        vec![ClipWindow::new(0.0, CLIP_LENGTH_SECS.min(total))]
    } else if total <= TWO_CLIP_MAX_SECS {
        vec![
            ClipWindow::new(0.0, CLIP_LENGTH_SECS),
            ClipWindow::new(end_offset, CLIP_LENGTH_SECS),
        ]
    } else {
        let middle_offset = (total / 2.0 - CLIP_LENGTH_SECS / 2.0).max(0.0);
        vec![
            ClipWindow::new(0.0, CLIP_LENGTH_SECS),
            ClipWindow::new(middle_offset, CLIP_LENGTH_SECS),
            ClipWindow::new(end_offset, CLIP_LENGTH_SECS),
        ]
    }
}

fn clip_command(start_offset: f64, max_duration: f64) -> ToolCommand {
    FfmpegCommand::new()
        .seek(start_offset)
        .duration(max_duration)
        .no_video()
        .audio_channels(1)
        .sample_rate(SAMPLE_RATE_HZ)
        .audio_codec("libmp3lame")
        .audio_bitrate(SAMPLE_BITRATE)
        .output_extension("mp3")
        .build()
}

/// Extract one clip of at most `max_duration` seconds starting at `start_offset`.
pub async fn extract_sample(
    runner: &ProcessRunner,
    bytes: &[u8],
    input_ext: &str,
    max_duration: f64,
    start_offset: f64,
) -> MediaResult<AudioSample> {
    let cmd = clip_command(start_offset, max_duration);
    let audio = runner.run(bytes, input_ext, &cmd).await?;

    debug!(
        offset = start_offset,
        length = max_duration,
        size = audio.len(),
        "Extracted audio sample"
    );

    Ok(AudioSample {
        bytes: audio,
        mime_type: SAMPLE_MIME.to_string(),
        offset_seconds: start_offset,
        duration_seconds: max_duration,
    })
}

/// Clips extracted for one plan, plus the windows that failed.
#[derive(Debug, Default)]
pub struct SampledAudio {
    /// In plan (offset) order
    pub samples: Vec<AudioSample>,
    pub failures: Vec<(ClipWindow, String)>,
}

/// Extract every window of `plan`, one after another.
///
/// A clip that fails to decode is recorded and skipped. Errors that would
/// fail every later clip too (missing tool, timeout, cancellation) abort.
pub async fn extract_plan(
    runner: &ProcessRunner,
    bytes: &[u8],
    input_ext: &str,
    plan: &[ClipWindow],
) -> MediaResult<SampledAudio> {
    let mut sampled = SampledAudio::default();

    for window in plan {
        match extract_sample(
            runner,
            bytes,
            input_ext,
            window.length_seconds,
            window.offset_seconds,
        )
        .await
        {
            Ok(sample) => sampled.samples.push(sample),
            Err(e) if e.aborts_extraction() => return Err(e),
            Err(e) => {
                warn!(
                    offset = window.offset_seconds,
                    error = %e,
                    "Audio clip extraction failed, skipping clip"
                );
                metrics::counter!(metric_names::DEGRADED_EVIDENCE_TOTAL, "kind" => "clip").increment(1);
                sampled.failures.push((*window, e.to_string()));
            }
        }
    }

    Ok(sampled)
}

impl SampledAudio {
    /// Fail if no clip at all could be extracted.
    pub fn into_result(self) -> MediaResult<Vec<AudioSample>> {
        if self.samples.is_empty() {
            let reason = self
                .failures
                .first()
                .map(|(_, reason)| reason.clone())
                .unwrap_or_else(|| "empty sampling plan".to_string());
            return Err(MediaError::tool_failed(
                "ffmpeg",
                format!("no audio clips extracted: {}", reason),
                None,
                None,
            ));
        }
        Ok(self.samples)
    }
}
