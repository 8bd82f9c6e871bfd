//! Verification worker binary.
//!
//! Verifies one local file end-to-end against the configured transcription
//! and moderation services and prints the result as JSON.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cguard_clients::{HttpModerator, HttpTranscriber};
use cguard_models::{ContentType, JobId, ProgressEvent, VerificationJob};
use cguard_storage::{ObjectStorage, R2Client};
use cguard_worker::{
    metrics, ProgressSink, RedisProgressSink, VerificationExecutor, VerificationPipeline,
    VerifierConfig,
};

#[derive(Parser, Debug)]
#[command(name = "cguard-worker")]
#[command(about = "Verify a content file before publishing")]
#[command(version)]
struct Args {
    /// File to verify
    file: PathBuf,

    /// Content type: video, audio or book
    #[arg(short = 't', long = "type")]
    content_type: ContentType,

    /// Title shown to moderation
    #[arg(long)]
    title: String,

    /// Mime type of the file (guessed from the extension when omitted)
    #[arg(long)]
    mime: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Cover image sent as extra evidence
    #[arg(long)]
    thumbnail: Option<PathBuf>,

    /// Language hint for transcription (e.g. "en")
    #[arg(long)]
    language: Option<String>,

    /// Job ID (random when omitted)
    #[arg(long)]
    job_id: Option<String>,

    /// Upload approved content to this storage folder
    #[arg(long)]
    publish_folder: Option<String>,

    /// Redis URL for progress events
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Address for the Prometheus scrape endpoint
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run(Args::parse()).await {
        error!("Verification failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting cguard-worker");

    if let Some(addr) = args.metrics_addr {
        metrics::install_prometheus(addr).context("failed to install metrics exporter")?;
        info!("Serving metrics on {}", addr);
    }

    let config = VerifierConfig::from_env();
    info!("Verifier config: {:?}", config);

    let job = load_job(&args).await?;
    let job_id = job.job_id().clone();
    let file_bytes = job.file_bytes().to_vec();
    let mime_type = job.mime_type().to_string();

    let transcriber = HttpTranscriber::from_env().context("transcription client")?;
    let moderator = HttpModerator::from_env().context("moderation client")?;
    let pipeline =
        VerificationPipeline::with_ffmpeg(config, Arc::new(transcriber), Arc::new(moderator));
    let executor = Arc::new(VerificationExecutor::new(pipeline));
    let reaper = executor.spawn_reaper();

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    let sink = progress_sink(args.redis_url.as_deref())?;
    let outcome = executor
        .submit(job, sink)
        .await
        .context("verification task panicked")?;
    executor.shutdown();
    reaper.await.ok();

    let result = outcome.map_err(|e| anyhow!("{} ({})", e, e.kind()))?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(folder) = args.publish_folder.as_deref() {
        if result.approved {
            let storage = R2Client::from_env().context("storage client")?;
            let url = storage.upload(file_bytes, folder, &mime_type).await?;
            info!(job_id = %job_id, url = %url, "Published approved content");
            println!("{}", url);
        } else {
            warn!(job_id = %job_id, "Content rejected, not publishing");
        }
    }

    Ok(())
}

async fn load_job(args: &Args) -> Result<VerificationJob> {
    let bytes = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let mime = match &args.mime {
        Some(mime) => mime.clone(),
        None => guess_mime(&args.file)
            .ok_or_else(|| anyhow!("cannot guess mime type of {}, pass --mime", args.file.display()))?
            .to_string(),
    };

    let mut job = VerificationJob::new(args.content_type, mime, bytes, args.title.clone());
    if let Some(id) = &args.job_id {
        job = job.with_job_id(JobId::from_string(id.clone()));
    }
    if let Some(description) = &args.description {
        job = job.with_description(description.clone());
    }
    if let Some(language) = &args.language {
        job = job.with_language_hint(language.clone());
    }
    if let Some(path) = &args.thumbnail {
        let thumb = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mime = guess_mime(path).unwrap_or("image/jpeg");
        job = job.with_thumbnail(thumb, mime);
    }
    Ok(job)
}

fn progress_sink(redis_url: Option<&str>) -> Result<Arc<dyn ProgressSink>> {
    let sink: Arc<dyn ProgressSink> = match redis_url {
        Some(url) => Arc::new(RedisProgressSink::spawn(url)?),
        None => Arc::new(|event: ProgressEvent| {
            info!(
                stage = event.stage.as_str(),
                percent = event.percent,
                "{}", event.message
            );
        }),
    };
    Ok(sink)
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => return None,
    })
}
