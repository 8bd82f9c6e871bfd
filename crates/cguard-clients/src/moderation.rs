//! Moderation service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use cguard_models::{ModerationRequest, ModerationVerdict};

use crate::error::{ClientError, ClientResult};
use crate::retry::{require_url, RetryPolicy};

const SERVICE: &str = "moderation";

/// Decides whether a piece of evidence may be published.
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn moderate(&self, request: &ModerationRequest) -> ClientResult<ModerationVerdict>;
}

/// Configuration for the moderation client.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8003".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl ModerationConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("MODERATION_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("MODERATION_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            timeout: std::env::var("MODERATION_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("MODERATION_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// JSON-over-HTTP moderation client.
pub struct HttpModerator {
    http: Client,
    config: ModerationConfig,
    retry: RetryPolicy,
}

impl HttpModerator {
    pub fn new(config: ModerationConfig) -> ClientResult<Self> {
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
        Self::new(ModerationConfig::from_env())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Moderator for HttpModerator {
    async fn moderate(&self, request: &ModerationRequest) -> ClientResult<ModerationVerdict> {
        let url = format!("{}/moderate", self.config.base_url.trim_end_matches('/'));
        debug!(
            content_type = %request.content_type,
            frames = request.frames.as_ref().map_or(0, Vec::len),
            has_transcript = request.transcript.is_some(),
            has_thumbnail = request.thumbnail.is_some(),
            "Sending moderation request"
        );

        let url = &url;
        let verdict = self
            .retry
            .run(SERVICE, move || async move {
                let mut http_request = self.http.post(url).json(request);
                if let Some(key) = &self.config.api_key {
                    http_request = http_request.bearer_auth(key);
                }
                let response = http_request.send().await?;
                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(ClientError::from_status(SERVICE, status, text));
                }
                let bytes = response.bytes().await?;
                serde_json::from_slice::<ModerationVerdict>(&bytes).map_err(|e| {
                    ClientError::InvalidResponse(format!("moderation verdict: {}", e))
                })
            })
            .await?;

        info!(
            approved = verdict.approved,
            categories = ?verdict.detail.flagged_categories,
            "Moderation verdict received"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cguard_models::{ContentType, Frame};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpModerator {
        HttpModerator::new(ModerationConfig {
            base_url: format!("{}/", server.uri()),
            api_key: None,
            timeout: Duration::from_secs(5),
            max_retries: 2,
        })
        .unwrap()
        .with_retry_policy(RetryPolicy::new(2).with_base_delay(Duration::from_millis(1)))
    }

    fn request() -> ModerationRequest {
        ModerationRequest {
            transcript: Some("hello".into()),
            frames: Some(vec![Frame::from_jpeg(b"jpg", 5.0)]),
            thumbnail: None,
            title: "Clip".into(),
            description: None,
            content_type: ContentType::Video,
        }
    }

    #[tokio::test]
    async fn test_moderate_posts_evidence() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/moderate"))
            .and(body_partial_json(serde_json::json!({
                "transcript": "hello",
                "title": "Clip",
                "contentType": "video",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "approved": false,
                "detail": {"reason": "violence", "flaggedCategories": ["violence"]},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = client(&server).moderate(&request()).await.unwrap();
        assert!(!verdict.approved);
        assert_eq!(verdict.detail.flagged_categories, vec!["violence"]);
    }

    #[tokio::test]
    async fn test_persistent_outage_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/moderate"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).moderate(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/moderate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).moderate(&request()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
