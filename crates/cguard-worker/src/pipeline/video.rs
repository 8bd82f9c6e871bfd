//! Video strategy: probe, then audio sampling alongside frame extraction.

use cguard_media::select_sampling_plan;
use cguard_models::Stage;

use super::transcribe::{transcribe_samples, Transcript};
use super::{Evidence, RunContext};
use crate::error::{VerifyError, VerifyResult};
use crate::extractor::MediaScope;

pub(crate) async fn collect(ctx: &RunContext<'_>, scope: &MediaScope<'_>) -> VerifyResult<Evidence> {
    let extractor = ctx.pipeline.extractor.as_ref();
    let config = &ctx.pipeline.config;

    extractor.ensure_tools().await?;
    let duration = extractor.probe_duration(scope).await?;
    ctx.stage(
        Stage::Sampling,
        &format!("Sampling audio and frames from {:.1}s of video", duration),
    );

    let plan = select_sampling_plan(duration);
    let audio_path = async {
        let sampled = extractor.sample_audio(scope, &plan).await?;
        ctx.stage(
            Stage::Transcribing,
            &format!("Transcribing {} audio clip(s)", sampled.samples.len()),
        );
        let transcript = transcribe_samples(ctx, &sampled.samples).await?;
        VerifyResult::Ok((sampled.failures.len() as u32, transcript))
    };
    let frame_path = extractor.extract_frames(scope, config.frame_count, duration);

    let (audio, frames) = tokio::join!(audio_path, frame_path);
    let (failed_clips, Transcript { text, failed }) = audio?;
    let frames = frames?;

    let mut evidence = Evidence::default();
    evidence.degradation.failed_clips = failed_clips;
    evidence.degradation.failed_transcriptions = failed;
    evidence.degradation.failed_frames = frames.failures.len() as u32;

    if failed_clips > 0 && failed_clips as usize == plan.len() {
        ctx.logger
            .log_warning("no audio clips extracted, continuing on frames alone");
    }
    if !frames.failures.is_empty() {
        ctx.logger.log_warning(&format!(
            "{} of {} frame(s) could not be extracted",
            frames.failures.len(),
            frames.requested()
        ));
    }

    if frames.frames.is_empty() && config.require_frames {
        return Err(VerifyError::tool_failed("no frames could be extracted"));
    }

    ctx.stage(
        Stage::FramesReady,
        &format!("{} frame(s) ready", frames.frames.len()),
    );

    evidence.transcript = Some(text);
    if !frames.frames.is_empty() {
        evidence.frames = Some(frames.frames);
    }
    Ok(evidence)
}
