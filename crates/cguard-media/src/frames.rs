//! Keyframe sampling.

use futures::future::join_all;
use tracing::{debug, warn};

use cguard_models::Frame;

use crate::command::{FfmpegCommand, ToolCommand};
use crate::error::{MediaError, MediaResult};
use crate::metric_names;
use crate::runner::ProcessRunner;

/// Frames taken when the caller does not ask for a specific count.
pub const DEFAULT_FRAME_COUNT: usize = 3;
/// Output width; height follows the aspect ratio.
const FRAME_WIDTH: u32 = 512;
/// ffmpeg JPEG quality scale, traded down for payload size.
const FRAME_JPEG_QUALITY: u8 = 5;
/// Earliest timestamp for the opening frame, skipping intros and black frames.
const MIN_FIRST_FRAME_SECS: f64 = 5.0;

/// Compute the timestamps to sample for `frame_count` frames.
pub fn frame_timestamps(frame_count: usize, duration: f64) -> Vec<f64> {
    let d = if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    };

    match frame_count {
        0 => Vec::new(),
        1 => vec![MIN_FIRST_FRAME_SECS.max(0.5 * d)],
        2 => vec![MIN_FIRST_FRAME_SECS.max(0.1 * d), 0.5 * d],
        3 => vec![
            MIN_FIRST_FRAME_SECS.max(0.05 * d),
            0.5 * d,
            (d - 10.0).max(0.9 * d),
        ],
        n => {
            let mut timestamps = Vec::with_capacity(n);
            timestamps.push(MIN_FIRST_FRAME_SECS.max(0.05 * d));
            let step = d / n as f64;
            timestamps.extend((1..=n - 2).map(|k| k as f64 * step));
            timestamps.push((d - 10.0).max(0.95 * d));
            timestamps
        }
    }
}

fn frame_command(timestamp: f64) -> ToolCommand {
    FfmpegCommand::new()
        .seek(timestamp)
        .single_frame()
        .video_filter(format!("scale={}:-2", FRAME_WIDTH))
        .jpeg_quality(FRAME_JPEG_QUALITY)
        .output_extension("jpg")
        .build()
}

/// Frames extracted for one call, plus the timestamps that failed.
#[derive(Debug, Default)]
pub struct FrameSet {
    /// In timestamp-plan order
    pub frames: Vec<Frame>,
    pub failures: Vec<(f64, String)>,
}

impl FrameSet {
    pub fn requested(&self) -> usize {
        self.frames.len() + self.failures.len()
    }
}

/// Extract `frame_count` frames from `bytes`, all timestamps concurrently.
///
/// Frames that fail to decode are dropped and recorded in
/// [`FrameSet::failures`]. A missing tool, a timeout or cancellation on any
/// frame fails the whole call. The input is staged once in a subdirectory
/// that every frame reads from and that is removed before returning.
pub async fn extract_frames(
    runner: &ProcessRunner,
    bytes: &[u8],
    input_ext: &str,
    frame_count: usize,
    total_duration: f64,
) -> MediaResult<FrameSet> {
    let timestamps = frame_timestamps(frame_count, total_duration);
    if timestamps.is_empty() {
        return Ok(FrameSet::default());
    }

    let dir = runner.subdir("frames").await?;
    let staged = runner.stage_input(dir.path(), bytes, input_ext).await?;

    let attempts = join_all(timestamps.iter().map(|&ts| {
        let (dir, staged) = (dir.path(), &staged);
        async move {
            let cmd = frame_command(ts);
            let result = runner.run_staged(dir, staged, &cmd).await;
            (ts, result)
        }
    }))
    .await;

    drop(staged);
    drop(dir);

    let mut set = FrameSet::default();
    let mut fatal: Option<MediaError> = None;

    for (ts, result) in attempts {
        match result {
            Ok(jpeg) => set.frames.push(Frame::from_jpeg(&jpeg, ts)),
            Err(e) if e.aborts_extraction() => {
                fatal.get_or_insert(e);
            }
            Err(e) => {
                warn!(timestamp = ts, error = %e, "Frame extraction failed, dropping frame");
                metrics::counter!(metric_names::DEGRADED_EVIDENCE_TOTAL, "kind" => "frame").increment(1);
                set.failures.push((ts, e.to_string()));
            }
        }
    }

    if let Some(e) = fatal {
        return Err(e);
    }

    debug!(
        extracted = set.frames.len(),
        failed = set.failures.len(),
        "Frame extraction finished"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::StaticAvailability;
    use crate::pool::ResourcePools;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_three_frames_for_100_seconds() {
        assert_eq!(frame_timestamps(3, 100.0), vec![5.0, 50.0, 90.0]);
    }

    #[test]
    fn test_one_and_two_frames() {
        assert_eq!(frame_timestamps(1, 100.0), vec![50.0]);
        assert_eq!(frame_timestamps(1, 4.0), vec![5.0]);
        assert_eq!(frame_timestamps(2, 100.0), vec![10.0, 50.0]);
        assert_eq!(frame_timestamps(2, 20.0), vec![5.0, 10.0]);
    }

    #[test]
    fn test_many_frames_are_evenly_spaced() {
        let ts = frame_timestamps(5, 200.0);
        assert_eq!(ts, vec![10.0, 40.0, 80.0, 120.0, 190.0]);
    }

    #[test]
    fn test_long_video_last_frame_is_ten_seconds_from_end() {
        let ts = frame_timestamps(3, 1000.0);
        assert_eq!(ts[2], 990.0);
    }

    #[test]
    fn test_zero_frames() {
        assert!(frame_timestamps(0, 100.0).is_empty());
    }

    #[test]
    fn test_frame_command_downscales() {
        let cmd = frame_command(12.0);
        let args = cmd.build_args(
            std::path::Path::new("in.mp4"),
            Some(std::path::Path::new("out.jpg")),
        );
        assert!(args.contains(&"scale=512:-2".to_string()));
        assert!(args.windows(2).any(|w| w == ["-frames:v", "1"]));
    }

    #[tokio::test]
    async fn test_unavailable_tool_fails_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new(
            dir.path(),
            Arc::new(StaticAvailability::unavailable()),
            ResourcePools::default(),
        );

        let err = extract_frames(&runner, b"x", "mp4", 3, 100.0)
            .await
            .unwrap_err();
        assert!(err.is_tool_unavailable());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_undecodable_input_drops_every_frame() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new(
            dir.path(),
            Arc::new(crate::availability::FfmpegAvailability::new()),
            ResourcePools::default(),
        );

        let set = extract_frames(&runner, b"not a video", "mp4", 3, 100.0)
            .await
            .unwrap();
        assert!(set.frames.is_empty());
        assert_eq!(set.failures.len(), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
