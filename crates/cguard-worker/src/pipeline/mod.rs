//! Verification pipeline orchestrator.
//!
//! One run: validate the job, collect evidence with the strategy for its
//! content type, send the evidence to moderation, and report progress along
//! the way. Every run ends with exactly one `done` or `error` event, and the
//! job's scratch workspace is gone before the run returns.

mod audio;
mod book;
mod transcribe;
mod video;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::Instrument;

use cguard_clients::{Moderator, Transcriber};
use cguard_media::{wait_for_cancel, ResourcePools, ScratchWorkspace};
use cguard_models::{
    data_uri, ContentType, DegradationReport, Frame, ModerationRequest, Stage, VerificationJob,
    VerificationResult,
};

use crate::config::VerifierConfig;
use crate::error::{VerifyError, VerifyResult};
use crate::extractor::{FfmpegExtractor, MediaExtractor, MediaScope};
use crate::logging::JobLogger;
use crate::metrics;
use crate::progress::{ProgressReporter, ProgressSink};

/// Evidence gathered by a content-type strategy.
#[derive(Debug, Default)]
pub(crate) struct Evidence {
    transcript: Option<String>,
    frames: Option<Vec<Frame>>,
    degradation: DegradationReport,
}

/// Borrowed state shared by the strategies of one run.
pub(crate) struct RunContext<'a> {
    pipeline: &'a VerificationPipeline,
    job: &'a VerificationJob,
    reporter: &'a ProgressReporter,
    logger: &'a JobLogger,
}

/// Runs verification jobs against injected collaborators.
pub struct VerificationPipeline {
    config: VerifierConfig,
    extractor: Arc<dyn MediaExtractor>,
    transcriber: Arc<dyn Transcriber>,
    moderator: Arc<dyn Moderator>,
    pools: ResourcePools,
}

impl VerificationPipeline {
    pub fn new(
        config: VerifierConfig,
        extractor: Arc<dyn MediaExtractor>,
        transcriber: Arc<dyn Transcriber>,
        moderator: Arc<dyn Moderator>,
    ) -> Self {
        let pools = ResourcePools::new(config.pool_limits());
        Self {
            config,
            extractor,
            transcriber,
            moderator,
            pools,
        }
    }

    /// Pipeline using ffmpeg from PATH, sharing one set of pools between
    /// extraction and transcription.
    pub fn with_ffmpeg(
        config: VerifierConfig,
        transcriber: Arc<dyn Transcriber>,
        moderator: Arc<dyn Moderator>,
    ) -> Self {
        let pools = ResourcePools::new(config.pool_limits());
        let extractor = FfmpegExtractor::with_defaults(pools.clone(), config.tool_timeout);
        Self {
            config,
            extractor: Arc::new(extractor),
            transcriber,
            moderator,
            pools,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify `job` without external cancellation.
    pub async fn verify(
        &self,
        job: &VerificationJob,
        sink: Arc<dyn ProgressSink>,
    ) -> VerifyResult<VerificationResult> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.verify_with_cancel(job, sink, cancel_rx).await
    }

    /// Verify `job`, aborting when `cancel` flips to `true` or the job timeout passes.
    pub async fn verify_with_cancel(
        &self,
        job: &VerificationJob,
        sink: Arc<dyn ProgressSink>,
        cancel: watch::Receiver<bool>,
    ) -> VerifyResult<VerificationResult> {
        let logger = JobLogger::new(job.job_id(), job.content_type());
        let span = logger.create_span();
        self.verify_inner(job, sink, cancel, logger)
            .instrument(span)
            .await
    }

    async fn verify_inner(
        &self,
        job: &VerificationJob,
        sink: Arc<dyn ProgressSink>,
        cancel: watch::Receiver<bool>,
        logger: JobLogger,
    ) -> VerifyResult<VerificationResult> {
        let reporter = ProgressReporter::new(job.job_id().clone(), sink);
        let content_type = job.content_type().as_str();
        let started = Instant::now();

        metrics::record_job_started(content_type);
        logger.log_start(&format!("{:?}", job));
        reporter.stage(Stage::Received, "Job received");

        let ctx = RunContext {
            pipeline: self,
            job,
            reporter: &reporter,
            logger: &logger,
        };

        let mut cancel_wait = cancel.clone();
        let outcome = tokio::select! {
            biased;
            _ = wait_for_cancel(&mut cancel_wait) => Err(VerifyError::Cancelled),
            res = tokio::time::timeout(self.config.job_timeout, ctx.run(cancel)) => {
                res.unwrap_or(Err(VerifyError::TimedOut(self.config.job_timeout)))
            }
        };

        match &outcome {
            Ok(result) => {
                reporter.stage(Stage::Done, if result.approved { "Approved" } else { "Rejected" });
                logger.log_completion(result.approved, result.degradation.is_degraded());
                metrics::record_job_completed(
                    content_type,
                    result.approved,
                    started.elapsed().as_secs_f64(),
                );
            }
            Err(e) => {
                reporter.error(format!("{}: {}", e.kind(), e));
                logger.log_error(
                    e.kind(),
                    &format!("{} (stopped at {}%)", e, reporter.last_percent()),
                );
                metrics::record_job_failed(content_type, e.kind());
            }
        }

        outcome
    }
}

impl RunContext<'_> {
    async fn run(&self, cancel: watch::Receiver<bool>) -> VerifyResult<VerificationResult> {
        self.stage(Stage::Validating, "Validating input");
        validate(self.job)?;

        let evidence = match self.job.content_type() {
            ContentType::Book => book::collect(self).await?,
            media_type => self.collect_media(media_type, cancel).await?,
        };

        self.moderate(evidence).await
    }

    /// Run a media strategy inside a fresh scratch workspace.
    async fn collect_media(
        &self,
        content_type: ContentType,
        cancel: watch::Receiver<bool>,
    ) -> VerifyResult<Evidence> {
        let workspace = ScratchWorkspace::create(
            &self.pipeline.config.scratch_root,
            self.job.job_id().as_str(),
        )
        .await?;

        let scope = MediaScope {
            scratch_dir: workspace.path(),
            input: self.job.file_bytes(),
            input_ext: self.job.input_extension(),
            content_type,
            cancel,
        };

        let collected = match content_type {
            ContentType::Video => video::collect(self, &scope).await,
            _ => audio::collect(self, &scope).await,
        };
        drop(scope);

        if let Err(e) = workspace.close().await {
            self.logger
                .log_warning(&format!("failed to remove scratch workspace: {}", e));
        }
        collected
    }

    async fn moderate(&self, evidence: Evidence) -> VerifyResult<VerificationResult> {
        self.stage(Stage::Moderating, "Sending evidence to moderation");
        let job = self.job;

        let request = ModerationRequest {
            transcript: evidence.transcript.clone(),
            frames: evidence.frames.clone(),
            thumbnail: job
                .thumbnail()
                .map(|thumb| data_uri(&thumb.mime_type, &thumb.bytes)),
            title: job.title().to_string(),
            description: job.description().map(str::to_string),
            content_type: job.content_type(),
        };

        let started = Instant::now();
        let verdict = self
            .pipeline
            .moderator
            .moderate(&request)
            .await
            .map_err(|e| VerifyError::ModerationFailed(e.to_string()))?;
        metrics::record_stage_duration(Stage::Moderating.as_str(), started.elapsed().as_secs_f64());

        self.reporter.report(
            Stage::Moderating,
            95,
            if verdict.approved {
                "Verdict received: approved"
            } else {
                "Verdict received: rejected"
            },
        );

        Ok(VerificationResult {
            approved: verdict.approved,
            moderation_detail: verdict.detail,
            transcript: evidence.transcript,
            frames: evidence.frames,
            degradation: evidence.degradation,
        })
    }

    fn stage(&self, stage: Stage, message: &str) {
        self.reporter.stage(stage, message);
        self.logger.log_stage(stage, message);
    }

    /// Log and count a non-fatal evidence loss.
    fn degraded(&self, kind: &'static str, count: u32, message: String) {
        if count == 0 {
            return;
        }
        self.logger
            .log_warning(&VerifyError::degraded(message).to_string());
        metrics::record_degraded(kind, u64::from(count));
    }
}

/// Reject malformed jobs before any tool runs.
fn validate(job: &VerificationJob) -> VerifyResult<()> {
    if job.file_bytes().is_empty() {
        return Err(VerifyError::invalid_input("file is empty"));
    }
    if job.title().trim().is_empty() {
        return Err(VerifyError::invalid_input("title is required"));
    }
    if !job.content_type().accepts_mime(job.mime_type()) {
        return Err(VerifyError::invalid_input(format!(
            "mime type '{}' does not match content type '{}'",
            job.mime_type(),
            job.content_type()
        )));
    }
    if let Some(thumb) = job.thumbnail() {
        if thumb.bytes.is_empty() {
            return Err(VerifyError::invalid_input("thumbnail is empty"));
        }
        if !thumb.mime_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(VerifyError::invalid_input(format!(
                "thumbnail mime type '{}' is not an image",
                thumb.mime_type
            )));
        }
    }
    Ok(())
}
