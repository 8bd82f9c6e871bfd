//! Process runner for in-memory buffers.
//!
//! Stages the input buffer in a scratch file, runs the tool with a timeout
//! and optional cancellation, reads the declared output and removes both
//! scratch files on every exit path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::availability::ToolAvailability;
use crate::command::{OutputMode, ToolCommand};
use crate::error::{MediaError, MediaResult};
use crate::metric_names;
use crate::pool::ResourcePools;
use crate::scratch::ScratchDir;

/// Keep at most this much stderr on errors.
const STDERR_TAIL_BYTES: usize = 2048;

/// Runs tool templates against byte buffers inside one scratch directory.
#[derive(Clone)]
pub struct ProcessRunner {
    scratch_dir: PathBuf,
    availability: Arc<dyn ToolAvailability>,
    pools: ResourcePools,
    timeout: Duration,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl ProcessRunner {
    /// Create a runner writing into `scratch_dir`.
    pub fn new(
        scratch_dir: impl Into<PathBuf>,
        availability: Arc<dyn ToolAvailability>,
        pools: ResourcePools,
    ) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            availability,
            pools,
            timeout: Duration::from_secs(120),
            cancel_rx: None,
        }
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Create a subdirectory of the scratch directory, removed on drop.
    pub async fn subdir(&self, label: &str) -> MediaResult<ScratchDir> {
        ScratchDir::create(&self.scratch_dir, label).await
    }

    /// Run `cmd` on `input`, staging files in the runner's scratch directory.
    pub async fn run(&self, input: &[u8], input_ext: &str, cmd: &ToolCommand) -> MediaResult<Vec<u8>> {
        self.run_in(&self.scratch_dir, input, input_ext, cmd).await
    }

    /// Run `cmd` on `input`, staging files in `dir`.
    pub async fn run_in(
        &self,
        dir: &Path,
        input: &[u8],
        input_ext: &str,
        cmd: &ToolCommand,
    ) -> MediaResult<Vec<u8>> {
        self.ensure_not_cancelled()?;
        self.availability.check(cmd.program()).await?;

        let staged = self.stage_input(dir, input, input_ext).await?;
        self.run_staged(dir, &staged, cmd).await
    }

    /// Write `input` into `dir` once, for several invocations to share.
    pub async fn stage_input(
        &self,
        dir: &Path,
        input: &[u8],
        input_ext: &str,
    ) -> MediaResult<ScratchFile> {
        self.ensure_not_cancelled()?;
        let staged = ScratchFile::new(dir, "in", input_ext);
        tokio::fs::write(staged.path(), input).await?;
        Ok(staged)
    }

    /// Run `cmd` on an already staged input. Outputs go to `dir`.
    pub async fn run_staged(
        &self,
        dir: &Path,
        input: &ScratchFile,
        cmd: &ToolCommand,
    ) -> MediaResult<Vec<u8>> {
        self.ensure_not_cancelled()?;
        self.availability.check(cmd.program()).await?;

        let _permit = self.pools.acquire(cmd.resource_class()).await?;
        self.ensure_not_cancelled()?;

        let output = match cmd.output_mode() {
            OutputMode::File { extension } => Some(ScratchFile::new(dir, "out", extension)),
            OutputMode::Stdout => None,
        };

        let args = cmd.build_args(input.path(), output.as_ref().map(ScratchFile::path));
        let stdout = self.execute(cmd.program(), &args).await?;

        match &output {
            Some(file) => read_output(cmd.program(), file.path()).await,
            None => Ok(stdout),
        }
    }

    /// Spawn the tool and wait with timeout and cancellation.
    async fn execute(&self, program: &str, args: &[String]) -> MediaResult<Vec<u8>> {
        debug!("Running {} {}", program, args.join(" "));
        let started = Instant::now();

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::tool_unavailable(program, e.to_string())
                } else {
                    MediaError::Io(e)
                }
            })?;

        // Dropping the wait future drops the child, and kill_on_drop reaps it.
        let wait = tokio::time::timeout(self.timeout, child.wait_with_output());
        let waited = match &self.cancel_rx {
            Some(cancel_rx) => {
                let mut cancel_rx = cancel_rx.clone();
                tokio::select! {
                    res = wait => res,
                    _ = wait_for_cancel(&mut cancel_rx) => {
                        info!("{} cancelled, killing process", program);
                        return Err(MediaError::Cancelled);
                    }
                }
            }
            None => wait.await,
        };

        let output = match waited {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "{} timed out after {} seconds, killing process",
                    program,
                    self.timeout.as_secs()
                );
                return Err(MediaError::Timeout {
                    tool: program.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        metrics::histogram!(metric_names::TOOL_DURATION_SECONDS, "tool" => program.to_string())
            .record(started.elapsed().as_secs_f64());

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(MediaError::tool_failed(
                program,
                "exited with non-zero status",
                Some(stderr_tail(&output.stderr)),
                output.status.code(),
            ))
        }
    }

    fn ensure_not_cancelled(&self) -> MediaResult<()> {
        match &self.cancel_rx {
            Some(rx) if *rx.borrow() => Err(MediaError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Resolve once the cancel flag is set. Never resolves if the sender is gone.
pub async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// A uniquely named scratch file, removed on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(dir: &Path, prefix: &str, extension: &str) -> Self {
        Self {
            path: dir.join(format!("{}-{}.{}", prefix, Uuid::new_v4().simple(), extension)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn read_output(program: &str, path: &Path) -> MediaResult<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Err(MediaError::tool_failed(
            program,
            "produced an empty output file",
            None,
            Some(0),
        )),
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::tool_failed(
            program,
            "produced no output file",
            None,
            Some(0),
        )),
        Err(e) => Err(e.into()),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::availability::StaticAvailability;
    use tempfile::TempDir;

    fn runner(dir: &Path) -> ProcessRunner {
        ProcessRunner::new(
            dir,
            Arc::new(StaticAvailability::available()),
            ResourcePools::default(),
        )
        .with_timeout(Duration::from_secs(10))
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_file_output_round_trip_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let cmd = ToolCommand::new("cp").input().output_file("txt");

        let out = runner(dir.path()).run(b"hello", "txt", &cmd).await.unwrap();

        assert_eq!(out, b"hello");
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_staged_input_is_shared_across_runs() {
        let dir = TempDir::new().unwrap();
        let runner = runner(dir.path());
        let cmd = ToolCommand::new("cat").input().stdout();

        let staged = runner.stage_input(dir.path(), b"shared", "bin").await.unwrap();
        let (a, b) = tokio::join!(
            runner.run_staged(dir.path(), &staged, &cmd),
            runner.run_staged(dir.path(), &staged, &cmd)
        );

        assert_eq!(a.unwrap(), b"shared");
        assert_eq!(b.unwrap(), b"shared");
        assert_eq!(entries(dir.path()), 1);
        drop(staged);
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_stdout_output() {
        let dir = TempDir::new().unwrap();
        let cmd = ToolCommand::new("cat").input().stdout();

        let out = runner(dir.path()).run(b"abc", "bin", &cmd).await.unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_failure_captures_stderr_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let cmd = ToolCommand::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .output_file("bin");

        let err = runner(dir.path()).run(b"x", "bin", &cmd).await.unwrap_err();
        match err {
            MediaError::ToolFailed {
                stderr, exit_code, ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.as_deref(), Some("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_output_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let cmd = ToolCommand::new("true").output_file("jpg");

        let err = runner(dir.path()).run(b"x", "bin", &cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolFailed { .. }));
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_timeout_kills_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let cmd = ToolCommand::new("sleep").arg("5").stdout();

        let err = runner(dir.path())
            .with_timeout(Duration::from_millis(200))
            .run(b"x", "bin", &cmd)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let dir = TempDir::new().unwrap();
        let (tx, rx) = watch::channel(false);
        let cmd = ToolCommand::new("sleep").arg("5").stdout();
        let runner = runner(dir.path()).with_cancel(rx);

        let handle = tokio::spawn(async move { runner.run(b"x", "bin", &cmd).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_unavailable_tool_short_circuits() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new(
            dir.path(),
            Arc::new(StaticAvailability::unavailable()),
            ResourcePools::default(),
        );
        let cmd = ToolCommand::new("cat").input().stdout();

        let err = runner.run(b"x", "bin", &cmd).await.unwrap_err();
        assert!(err.is_tool_unavailable());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_spawn_not_found_maps_to_unavailable() {
        let dir = TempDir::new().unwrap();
        let cmd = ToolCommand::new("cguard-no-such-program").stdout();

        let err = runner(dir.path()).run(b"x", "bin", &cmd).await.unwrap_err();
        assert!(err.is_tool_unavailable());
    }

    #[test]
    fn test_stderr_tail_truncates() {
        let long = "é".repeat(STDERR_TAIL_BYTES);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.len() <= STDERR_TAIL_BYTES);
    }
}
