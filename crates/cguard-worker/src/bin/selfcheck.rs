//! Deployment self-check: scratch root, tools and collaborator configuration.

use std::path::Path;

use cguard_media::{FfmpegAvailability, ToolAvailability};
use cguard_worker::VerifierConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = VerifierConfig::from_env();

    println!(
        "cguard-selfcheck: starting with scratch_root={}",
        config.scratch_root.display()
    );
    ensure_scratch_root(&config.scratch_root).await?;
    ensure_tools(&["ffmpeg", "ffprobe"]).await?;
    ensure_env_present(&["TRANSCRIBE_URL", "MODERATION_URL"])?;

    println!("cguard-selfcheck: ok");
    Ok(())
}

async fn ensure_scratch_root(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".cguard-selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("scratch root {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

async fn ensure_tools(tools: &[&str]) -> anyhow::Result<()> {
    let availability = FfmpegAvailability::new();
    for tool in tools {
        availability.check(tool).await?;
    }
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
