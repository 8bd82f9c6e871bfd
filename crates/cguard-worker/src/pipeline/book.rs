//! Book strategy: document text as the transcript.

use cguard_media::{extract_text, TEXT_CAP_MODERATION};
use cguard_models::Stage;

use super::{Evidence, RunContext};
use crate::error::{VerifyError, VerifyResult};

pub(crate) async fn collect(ctx: &RunContext<'_>) -> VerifyResult<Evidence> {
    ctx.stage(Stage::Sampling, "Extracting document text");

    let bytes = ctx.job.file_bytes().to_vec();
    let mime = ctx.job.mime_type().to_string();
    let text = tokio::task::spawn_blocking(move || extract_text(&bytes, &mime, TEXT_CAP_MODERATION))
        .await
        .map_err(|e| VerifyError::internal(format!("text extraction task failed: {}", e)))?;

    let mut evidence = Evidence::default();
    if text.is_empty() {
        evidence.degradation.empty_text = true;
        ctx.degraded("text", 1, "document yielded no text".to_string());
    }

    ctx.stage(
        Stage::TextReady,
        &format!("Extracted {} characters", text.chars().count()),
    );
    evidence.transcript = Some(text);
    Ok(evidence)
}
