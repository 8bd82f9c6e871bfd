//! Duration probing.
//!
//! Duration only steers the sampling plan, so a probe failure falls back to a
//! content-aware default instead of failing the job.

use tracing::{debug, warn};

use cguard_models::ContentType;

use crate::command::ToolCommand;
use crate::error::MediaResult;
use crate::pool::ResourceClass;
use crate::runner::ProcessRunner;

/// Fallback duration for video-like content, in seconds.
pub const VIDEO_FALLBACK_SECS: f64 = 10.0;
/// Fallback duration for audio-like content, in seconds.
pub const AUDIO_FALLBACK_SECS: f64 = 60.0;

/// Duration assumed when probing fails.
pub fn fallback_duration(content_type: ContentType) -> f64 {
    match content_type {
        ContentType::Audio => AUDIO_FALLBACK_SECS,
        ContentType::Video | ContentType::Book => VIDEO_FALLBACK_SECS,
    }
}

fn duration_command() -> ToolCommand {
    ToolCommand::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .input()
        .stdout()
        .class(ResourceClass::Probe)
}

/// Probe the duration of `bytes` in seconds.
///
/// Only cancellation is reported as an error; every other failure yields
/// [`fallback_duration`].
pub async fn probe_duration(
    runner: &ProcessRunner,
    bytes: &[u8],
    input_ext: &str,
    content_type: ContentType,
) -> MediaResult<f64> {
    let fallback = fallback_duration(content_type);

    match runner.run(bytes, input_ext, &duration_command()).await {
        Ok(stdout) => match parse_duration(&String::from_utf8_lossy(&stdout)) {
            Some(seconds) => {
                debug!(seconds, "Probed media duration");
                Ok(seconds)
            }
            None => {
                warn!(fallback, "Unparseable ffprobe duration, using fallback");
                Ok(fallback)
            }
        },
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!(error = %e, fallback, "Duration probe failed, using fallback");
            Ok(fallback)
        }
    }
}

/// Parse ffprobe's bare duration output ("123.456000" or "N/A").
fn parse_duration(output: &str) -> Option<f64> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
}
