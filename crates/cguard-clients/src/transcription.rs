//! Speech-to-text client.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use cguard_models::Transcription;

use crate::error::{ClientError, ClientResult};
use crate::retry::{require_url, RetryPolicy};

const SERVICE: &str = "transcription";

/// Converts an audio clip to text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_hint: &str,
        language_hint: Option<&str>,
    ) -> ClientResult<Transcription>;
}

/// Configuration for the transcription client.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Base URL of the transcription service
    pub base_url: String,
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl TranscriptionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("TRANSCRIBE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("TRANSCRIBE_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            timeout: std::env::var("TRANSCRIBE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("TRANSCRIBE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscribeRequest<'a> {
    /// Base64-encoded audio
    audio: String,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    language: Option<String>,
}

/// JSON-over-HTTP transcription client.
pub struct HttpTranscriber {
    http: Client,
    config: TranscriptionConfig,
    retry: RetryPolicy,
}

impl HttpTranscriber {
    pub fn new(config: TranscriptionConfig) -> ClientResult<Self> {
        require_url(SERVICE, &config.base_url)?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Network)?;
        let retry = RetryPolicy::new(config.max_retries);

        Ok(Self {
            http,
            config,
            retry,
        })
    }

    pub fn from_env() -> ClientResult<Self> {
        Self::new(TranscriptionConfig::from_env())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_hint: &str,
        language_hint: Option<&str>,
    ) -> ClientResult<Transcription> {
        let url = format!("{}/transcribe", self.config.base_url.trim_end_matches('/'));
        let body = TranscribeRequest {
            audio: base64::engine::general_purpose::STANDARD.encode(audio),
            mime_type: mime_hint,
            language: language_hint,
        };

        debug!(size = audio.len(), mime = mime_hint, "Sending transcription request");

        let (url, body) = (&url, &body);
        let response = self
            .retry
            .run(SERVICE, move || async move {
                let mut request = self.http.post(url).json(body);
                if let Some(key) = &self.config.api_key {
                    request = request.bearer_auth(key);
                }
                let response = request.send().await?;
                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(ClientError::from_status(SERVICE, status, text));
                }
                Ok(response.json::<TranscribeResponse>().await?)
            })
            .await?;

        let text = response
            .text
            .ok_or_else(|| ClientError::InvalidResponse("transcription missing text".into()))?;

        Ok(Transcription {
            text: text.trim().to_string(),
            confidence: response.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            language: response.language,
        })
    }
}
