//! Progress sinks and the per-run reporter.
//!
//! Sinks are fire-and-forget: `emit` never blocks the pipeline and never
//! fails it. The [`ProgressReporter`] enforces ordering for one run.

use std::sync::{Arc, Mutex};

use redis::AsyncCommands;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use cguard_models::{JobId, ProgressEvent, Stage};

use crate::error::{VerifyError, VerifyResult};

/// Receives progress events. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressSink;

impl ProgressSink for NoopProgressSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Publishes events on Redis channel `progress:<job_id>`.
///
/// Events are queued and published in order by a background task, so `emit`
/// stays synchronous. Publish failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct RedisProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl RedisProgressSink {
    /// Connect and spawn the publisher task. Must be called inside a Tokio runtime.
    pub fn spawn(redis_url: &str) -> VerifyResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| VerifyError::internal(format!("invalid redis url: {}", e)))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<ProgressEvent>();

        tokio::spawn(async move {
            let mut conn = None;
            while let Some(event) = rx.recv().await {
                if conn.is_none() {
                    match client.get_multiplexed_async_connection().await {
                        Ok(c) => conn = Some(c),
                        Err(e) => {
                            warn!(error = %e, "Redis unavailable, dropping progress event");
                            continue;
                        }
                    }
                }
                let Some(c) = conn.as_mut() else { continue };

                let channel = Self::channel_name(&event.job_id);
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize progress event");
                        continue;
                    }
                };

                debug!("Publishing progress event to {}", channel);
                if let Err(e) = c.publish::<_, _, ()>(&channel, payload).await {
                    warn!(error = %e, channel = %channel, "Failed to publish progress event");
                    conn = None;
                }
            }
        });

        Ok(Self { tx })
    }

    /// Get the channel name for a job.
    pub fn channel_name(job_id: &JobId) -> String {
        format!("progress:{}", job_id)
    }
}

impl ProgressSink for RedisProgressSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Default)]
struct ReporterState {
    rank: u8,
    percent: u8,
    started: bool,
    finished: bool,
}

/// Emits the progress events of one run in stage order.
///
/// Percent never decreases, stages never move backwards, and nothing is
/// emitted after `done` or `error`.
pub struct ProgressReporter {
    job_id: JobId,
    sink: Arc<dyn ProgressSink>,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub fn new(job_id: JobId, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            job_id,
            sink,
            state: Mutex::new(ReporterState::default()),
        }
    }

    /// Enter `stage` at its base percent.
    pub fn stage(&self, stage: Stage, message: impl Into<String>) {
        self.report(stage, stage.base_percent(), message);
    }

    /// Report `percent` within `stage`. Returns whether the event was emitted.
    pub fn report(&self, stage: Stage, percent: u8, message: impl Into<String>) -> bool {
        let event = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.finished || (state.started && stage.rank() < state.rank) {
                return false;
            }

            let percent = match stage {
                Stage::Error => state.percent,
                _ => percent.min(100).max(state.percent),
            };
            state.started = true;
            state.rank = stage.rank();
            state.percent = percent;
            state.finished = stage.is_terminal();

            ProgressEvent::new(&self.job_id, stage, percent, message)
        };

        self.sink.emit(event);
        true
    }

    /// Terminal `error` event carrying the last percent reached.
    pub fn error(&self, message: impl Into<String>) {
        self.report(Stage::Error, 0, message);
    }

    pub fn last_percent(&self) -> u8 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).percent
    }
}
