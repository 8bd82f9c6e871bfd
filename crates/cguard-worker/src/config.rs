//! Verifier configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use cguard_media::PoolLimits;

/// Verifier configuration.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Root directory for job scratch workspaces
    pub scratch_root: PathBuf,
    /// Timeout for a single ffmpeg/ffprobe invocation
    pub tool_timeout: Duration,
    /// Timeout for a whole verification run
    pub job_timeout: Duration,
    /// Maximum concurrent jobs per process
    pub max_concurrent_jobs: usize,
    /// Concurrent transcode (ffmpeg) processes
    pub max_transcode: usize,
    /// Concurrent probe (ffprobe) processes
    pub max_probe: usize,
    /// Concurrent transcription requests
    pub max_transcribe: usize,
    /// Frames sampled from video content
    pub frame_count: usize,
    /// Fail video jobs that yield no frames
    pub require_frames: bool,
    /// How often stale scratch entries are reaped
    pub reaper_interval: Duration,
    /// Age past which a scratch entry is considered stale
    pub scratch_max_age: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("cguard"),
            tool_timeout: Duration::from_secs(120),
            job_timeout: Duration::from_secs(600),
            max_concurrent_jobs: 2,
            max_transcode: 4,
            max_probe: 8,
            max_transcribe: 4,
            frame_count: 3,
            require_frames: false,
            reaper_interval: Duration::from_secs(300),
            scratch_max_age: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl VerifierConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            scratch_root: std::env::var("CGUARD_SCRATCH_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            tool_timeout: env_secs("CGUARD_TOOL_TIMEOUT_SECS").unwrap_or(defaults.tool_timeout),
            job_timeout: env_secs("CGUARD_JOB_TIMEOUT_SECS").unwrap_or(defaults.job_timeout),
            max_concurrent_jobs: env_parse("CGUARD_MAX_JOBS").unwrap_or(defaults.max_concurrent_jobs),
            max_transcode: env_parse("CGUARD_MAX_TRANSCODE").unwrap_or(defaults.max_transcode),
            max_probe: env_parse("CGUARD_MAX_PROBE").unwrap_or(defaults.max_probe),
            max_transcribe: env_parse("CGUARD_MAX_TRANSCRIBE").unwrap_or(defaults.max_transcribe),
            frame_count: env_parse("CGUARD_FRAME_COUNT").unwrap_or(defaults.frame_count),
            require_frames: env_parse("CGUARD_REQUIRE_FRAMES").unwrap_or(defaults.require_frames),
            reaper_interval: env_secs("CGUARD_REAPER_INTERVAL_SECS")
                .unwrap_or(defaults.reaper_interval),
            scratch_max_age: env_secs("CGUARD_SCRATCH_MAX_AGE_SECS")
                .unwrap_or(defaults.scratch_max_age),
        };
        config.with_safe_scratch_age()
    }

    /// Keep the reaper away from live workspaces: a scratch entry must outlive
    /// the longest job before it counts as stale.
    pub fn with_safe_scratch_age(mut self) -> Self {
        if self.scratch_max_age <= self.job_timeout {
            let raised = self.job_timeout * 2;
            warn!(
                scratch_max_age_secs = self.scratch_max_age.as_secs(),
                job_timeout_secs = self.job_timeout.as_secs(),
                raised_to_secs = raised.as_secs(),
                "Scratch max age does not exceed the job timeout, raising it"
            );
            self.scratch_max_age = raised;
        }
        self
    }

    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            transcode: self.max_transcode,
            probe: self.max_probe,
            transcribe: self.max_transcribe,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_secs)
}
