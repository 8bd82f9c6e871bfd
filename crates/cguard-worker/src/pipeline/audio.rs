//! Audio strategy: probe, sample, transcribe.

use cguard_media::select_sampling_plan;
use cguard_models::Stage;

use super::transcribe::transcribe_samples;
use super::{Evidence, RunContext};
use crate::error::VerifyResult;
use crate::extractor::MediaScope;

pub(crate) async fn collect(ctx: &RunContext<'_>, scope: &MediaScope<'_>) -> VerifyResult<Evidence> {
    let extractor = ctx.pipeline.extractor.as_ref();

    extractor.ensure_tools().await?;
    let duration = extractor.probe_duration(scope).await?;
    ctx.stage(
        Stage::Sampling,
        &format!("Sampling {:.1}s of audio", duration),
    );

    let plan = select_sampling_plan(duration);
    let sampled = extractor.sample_audio(scope, &plan).await?;
    let failed_clips = sampled.failures.len() as u32;
    // Audio is the only evidence here, so an empty sampling is fatal.
    let samples = sampled.into_result()?;

    ctx.stage(
        Stage::Transcribing,
        &format!("Transcribing {} audio clip(s)", samples.len()),
    );
    let transcript = transcribe_samples(ctx, &samples).await?;
    drop(samples);

    ctx.stage(Stage::TextReady, "Transcript ready");

    let mut evidence = Evidence {
        transcript: Some(transcript.text),
        ..Default::default()
    };
    evidence.degradation.failed_clips = failed_clips;
    evidence.degradation.failed_transcriptions = transcript.failed;
    Ok(evidence)
}
