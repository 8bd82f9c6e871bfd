//! External tool availability checks.
//!
//! The check runs `<tool> -version` once per checker instance and remembers
//! the outcome, so a long-lived worker pays for it once. Tests inject a
//! [`StaticAvailability`] instead of touching the host PATH.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Answers whether an external executable can be used.
#[async_trait]
pub trait ToolAvailability: Send + Sync {
    /// Return `Ok(())` if `tool` can be spawned, `ToolUnavailable` otherwise.
    async fn check(&self, tool: &str) -> MediaResult<()>;
}

type CheckCell = Arc<OnceCell<Result<(), String>>>;

/// Checks tools on PATH with a lightweight version probe, memoized per tool.
#[derive(Default)]
pub struct FfmpegAvailability {
    checks: Mutex<HashMap<String, CheckCell>>,
}

impl FfmpegAvailability {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell_for(&self, tool: &str) -> CheckCell {
        let mut checks = self
            .checks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        checks.entry(tool.to_string()).or_default().clone()
    }

    async fn probe(tool: &str) -> Result<(), String> {
        let path = which::which(tool).map_err(|e| format!("not found in PATH: {}", e))?;
        debug!(tool, path = %path.display(), "Probing tool version");

        let status = Command::new(&path)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| format!("failed to spawn: {}", e))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("-version exited with {:?}", status.code()))
        }
    }
}

#[async_trait]
impl ToolAvailability for FfmpegAvailability {
    async fn check(&self, tool: &str) -> MediaResult<()> {
        let cell = self.cell_for(tool);
        let outcome = cell.get_or_init(|| Self::probe(tool)).await;

        outcome.clone().map_err(|reason| {
            warn!(tool, reason = %reason, "External tool unavailable");
            MediaError::tool_unavailable(tool, reason)
        })
    }
}

/// Fixed answer, for tests and for deployments that validate tools at startup.
#[derive(Debug, Clone)]
pub struct StaticAvailability {
    available: bool,
}

impl StaticAvailability {
    pub fn available() -> Self {
        Self { available: true }
    }

    pub fn unavailable() -> Self {
        Self { available: false }
    }
}

#[async_trait]
impl ToolAvailability for StaticAvailability {
    async fn check(&self, tool: &str) -> MediaResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(MediaError::tool_unavailable(tool, "marked unavailable"))
        }
    }
}
