//! Concurrent transcription of sampled clips.

use std::time::Instant;

use futures::future::join_all;

use cguard_media::ResourceClass;
use cguard_models::AudioSample;

use super::RunContext;
use crate::error::VerifyResult;
use crate::metrics;

/// Joined transcript plus the number of clips whose transcription failed.
#[derive(Debug, Default)]
pub(crate) struct Transcript {
    pub text: String,
    pub failed: u32,
}

/// Transcribe every clip concurrently and join the texts in offset order.
///
/// A failed clip contributes nothing; the transcript may end up empty.
pub(crate) async fn transcribe_samples(
    ctx: &RunContext<'_>,
    samples: &[AudioSample],
) -> VerifyResult<Transcript> {
    let transcriber = ctx.pipeline.transcriber.as_ref();
    let pools = &ctx.pipeline.pools;
    let language_hint = ctx.job.language_hint();

    let attempts = join_all(samples.iter().map(|sample| async move {
        let _permit = pools.acquire(ResourceClass::Transcribe).await?;
        let started = Instant::now();
        let result = transcriber
            .transcribe(&sample.bytes, &sample.mime_type, language_hint)
            .await;
        metrics::record_transcription(result.is_ok(), started.elapsed().as_secs_f64());
        VerifyResult::Ok((sample.offset_seconds, result))
    }))
    .await;

    let mut segments = Vec::with_capacity(attempts.len());
    let mut failed = 0u32;
    for attempt in attempts {
        let (offset, result) = attempt?;
        match result {
            Ok(transcription) => segments.push((offset, transcription.text)),
            Err(e) => {
                failed += 1;
                ctx.degraded(
                    "transcription",
                    1,
                    format!("transcription of clip at {:.1}s failed: {}", offset, e),
                );
            }
        }
    }

    segments.sort_by(|a, b| a.0.total_cmp(&b.0));
    let text = segments
        .iter()
        .map(|(_, text)| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Transcript { text, failed })
}
