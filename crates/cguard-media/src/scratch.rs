//! Job-scoped scratch directories.
//!
//! Every file a job hands to ffmpeg lives under one directory named after the
//! job. The directory is removed when the job settles; `Drop` covers the
//! paths where the owning future is dropped mid-flight (timeouts, cancelled
//! tasks). [`reap_stale`] is the backstop for crashed processes.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::MediaResult;
use crate::metric_names;

/// Scratch directory owned by exactly one verification run.
#[derive(Debug)]
pub struct ScratchWorkspace {
    path: PathBuf,
    removed: bool,
}

impl ScratchWorkspace {
    /// Create `<root>/<job_id>-<unix_ms>-<random>`.
    pub async fn create(root: impl AsRef<Path>, job_id: &str) -> MediaResult<Self> {
        let name = format!(
            "{}-{}-{}",
            sanitize_component(job_id),
            chrono::Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        let path = root.as_ref().join(name);
        fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created scratch workspace");

        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it.
    pub async fn close(mut self) -> MediaResult<()> {
        self.removed = true;
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed scratch workspace");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to remove scratch workspace");
                }
            }
        }
    }
}

/// Subdirectory of a workspace, removed when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `<parent>/<label>-<random>`.
    pub async fn create(parent: impl AsRef<Path>, label: &str) -> MediaResult<Self> {
        let path = parent
            .as_ref()
            .join(format!("{}-{}", label, Uuid::new_v4().simple()));
        fs::create_dir_all(&path).await?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Delete entries under `root` whose modification time is older than `max_age`.
///
/// Returns the number of entries removed. A missing root is not an error.
pub async fn reap_stale(root: impl AsRef<Path>, max_age: Duration) -> MediaResult<usize> {
    let root = root.as_ref();
    let mut entries = match fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Failed to stat scratch entry");
                continue;
            }
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        let path = entry.path();
        let result = if metadata.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to reap scratch entry"),
        }
    }

    if removed > 0 {
        info!(root = %root.display(), removed, "Reaped orphaned scratch entries");
        metrics::counter!(metric_names::SCRATCH_REAPED_TOTAL).increment(removed as u64);
    }

    Ok(removed)
}

fn sanitize_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_workspace_close_removes_contents() {
        let root = TempDir::new().unwrap();
        let ws = ScratchWorkspace::create(root.path(), "job-1").await.unwrap();
        let path = ws.path().to_path_buf();
        fs::write(path.join("in.mp4"), b"data").await.unwrap();

        ws.close().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_workspace_drop_removes_contents() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = ScratchWorkspace::create(root.path(), "job-2").await.unwrap();
            fs::write(ws.path().join("out.mp3"), b"data").await.unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_get_distinct_dirs() {
        let root = TempDir::new().unwrap();
        let a = ScratchWorkspace::create(root.path(), "same").await.unwrap();
        let b = ScratchWorkspace::create(root.path(), "same").await.unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[tokio::test]
    async fn test_job_id_is_sanitized() {
        let root = TempDir::new().unwrap();
        let ws = ScratchWorkspace::create(root.path(), "../../etc").await.unwrap();
        assert!(ws.path().starts_with(root.path()));
        assert_eq!(ws.path().parent().unwrap(), root.path());
    }

    #[tokio::test]
    async fn test_reap_stale() {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("old-job")).await.unwrap();
        fs::write(root.path().join("stray.tmp"), b"x").await.unwrap();

        assert_eq!(reap_stale(root.path(), Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(reap_stale(root.path(), Duration::ZERO).await.unwrap(), 2);
        assert!(!root.path().join("old-job").exists());
    }

    #[tokio::test]
    async fn test_reap_missing_root() {
        let root = TempDir::new().unwrap();
        let missing = root.path().join("nope");
        assert_eq!(reap_stale(&missing, Duration::ZERO).await.unwrap(), 0);
    }
}
