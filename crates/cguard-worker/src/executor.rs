//! Job executor.
//!
//! Caps concurrent runs per process, keeps a cancellation handle per job and
//! runs the scratch reaper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cguard_media::reap_stale;
use cguard_models::{JobId, VerificationJob, VerificationResult};

use crate::error::{VerifyError, VerifyResult};
use crate::metrics;
use crate::pipeline::VerificationPipeline;
use crate::progress::ProgressSink;

type CancelRegistry = Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>;

/// Runs verification jobs with a per-process concurrency cap.
pub struct VerificationExecutor {
    pipeline: Arc<VerificationPipeline>,
    job_semaphore: Arc<Semaphore>,
    cancels: CancelRegistry,
    in_flight: Arc<AtomicUsize>,
    shutdown: watch::Sender<bool>,
}

impl VerificationExecutor {
    pub fn new(pipeline: VerificationPipeline) -> Self {
        let max_jobs = pipeline.config().max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);

        Self {
            pipeline: Arc::new(pipeline),
            job_semaphore: Arc::new(Semaphore::new(max_jobs)),
            cancels: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            shutdown,
        }
    }

    /// Spawn a verification run. The job waits for a free slot first.
    ///
    /// A job whose ID is already queued or running is rejected with
    /// `InvalidInput`, so every cancel handle maps to exactly one run.
    pub fn submit(
        &self,
        job: VerificationJob,
        sink: Arc<dyn ProgressSink>,
    ) -> JoinHandle<VerifyResult<VerificationResult>> {
        let job_id = job.job_id().clone();
        let cancel_rx = {
            let mut cancels = lock(&self.cancels);
            if cancels.contains_key(&job_id) {
                warn!(job_id = %job_id, "Rejecting duplicate job submission");
                let err =
                    VerifyError::invalid_input(format!("job {} is already submitted", job_id));
                return tokio::spawn(async move { Err(err) });
            }
            let (cancel_tx, cancel_rx) = watch::channel(*self.shutdown.borrow());
            cancels.insert(job_id.clone(), cancel_tx);
            cancel_rx
        };

        let pipeline = Arc::clone(&self.pipeline);
        let semaphore = Arc::clone(&self.job_semaphore);
        let cancels = Arc::clone(&self.cancels);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    let count = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    metrics::set_jobs_in_flight(count);
                    debug!(job_id = %job_id, in_flight = count, "Job slot acquired");

                    let result = pipeline.verify_with_cancel(&job, sink, cancel_rx).await;

                    let count = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
                    metrics::set_jobs_in_flight(count);
                    result
                }
                Err(_) => Err(VerifyError::internal("executor is closed")),
            };

            lock(&cancels).remove(&job_id);
            result
        })
    }

    /// Signal a queued or running job to stop. Returns false if the job is unknown.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match lock(&self.cancels).get(job_id) {
            Some(tx) => {
                info!(job_id = %job_id, "Cancelling job");
                let _ = tx.send(true);
                true
            }
            None => false,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cancel every job and stop the reaper.
    pub fn shutdown(&self) {
        info!("Shutting down executor");
        let _ = self.shutdown.send(true);
        for tx in lock(&self.cancels).values() {
            let _ = tx.send(true);
        }
    }

    /// Periodically delete scratch entries older than the configured age.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let config = self.pipeline.config().clone();
        let mut shutdown_rx = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.reaper_interval);
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match reap_stale(&config.scratch_root, config.scratch_max_age).await {
                            Ok(0) => {}
                            Ok(n) => info!("Reaped {} stale scratch entries", n),
                            Err(e) => warn!("Scratch reaper failed: {}", e),
                        }
                    }
                }
            }
            debug!("Scratch reaper stopped");
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
