//! Pipeline runs against the real ffmpeg/ffprobe binaries.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use cguard_models::{ContentType, VerificationJob};
use cguard_worker::{NoopProgressSink, VerificationPipeline, VerifierConfig};

mod common;
use common::{FakeModerator, FakeTranscriber};

/// Render a short test pattern with a sine tone.
fn render_sample(path: &Path, seconds: u32) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={}:size=320x240:rate=10", seconds))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=440:duration={}", seconds))
        .args(["-shortest", "-pix_fmt", "yuv420p"])
        .arg(path)
        .status()
        .expect("ffmpeg should run");
    assert!(status.success());
}

fn pipeline(scratch: &Path, moderator: Arc<FakeModerator>) -> VerificationPipeline {
    let config = VerifierConfig {
        scratch_root: scratch.to_path_buf(),
        tool_timeout: Duration::from_secs(60),
        ..Default::default()
    };
    VerificationPipeline::with_ffmpeg(config, Arc::new(FakeTranscriber::default()), moderator)
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_video_end_to_end() {
    let media = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let input = media.path().join("sample.mp4");
    render_sample(&input, 20);

    let moderator = Arc::new(FakeModerator::default());
    let job = VerificationJob::new(
        ContentType::Video,
        "video/mp4",
        std::fs::read(&input).unwrap(),
        "Test pattern",
    );

    let result = pipeline(scratch.path(), moderator.clone())
        .verify(&job, Arc::new(NoopProgressSink))
        .await
        .unwrap();

    let frames = result.frames.expect("frames extracted");
    assert_eq!(frames.len(), 3);
    assert!(frames
        .iter()
        .all(|f| f.inline_image_data.starts_with("data:image/jpeg;base64,")));
    // The fake transcriber echoes the MP3 bytes, so any text proves a clip was cut.
    assert!(!result.transcript.unwrap_or_default().is_empty());
    assert_eq!(moderator.calls(), 1);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_corrupt_audio_fails_cleanly() {
    let scratch = TempDir::new().unwrap();
    let moderator = Arc::new(FakeModerator::default());
    let job = VerificationJob::new(
        ContentType::Audio,
        "audio/mpeg",
        b"definitely not audio".to_vec(),
        "Broken",
    );

    let err = pipeline(scratch.path(), moderator.clone())
        .verify(&job, Arc::new(NoopProgressSink))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_execution_failed");
    assert_eq!(moderator.calls(), 0);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}
