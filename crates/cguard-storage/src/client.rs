//! R2 client implementation.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};
use uuid::Uuid;

use cguard_models::extension_for_mime;

use crate::error::{StorageError, StorageResult};

/// Stores bytes and returns the URL they are published under.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>, folder: &str, mime_type: &str) -> StorageResult<String>;
}

/// Configuration for R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// R2 endpoint URL (S3 API endpoint)
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region (usually "auto" for R2)
    pub region: String,
    /// Public base URL objects are served from
    pub public_base_url: String,
}

impl R2Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL")
                .map_err(|_| StorageError::config_error("R2_PUBLIC_BASE_URL not set"))?,
        })
    }
}

/// Build the object key for a new upload: `<folder>/<uuid>.<ext>`.
pub fn object_key(folder: &str, mime_type: &str) -> StorageResult<String> {
    let folder = folder.trim_matches('/');
    if folder.is_empty()
        || folder
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidFolder(folder.to_string()));
    }
    Ok(format!(
        "{}/{}.{}",
        folder,
        Uuid::new_v4(),
        extension_for_mime(mime_type)
    ))
}

/// Join the public base URL and an object key.
pub fn public_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl R2Client {
    /// Create a new R2 client from configuration.
    pub fn new(config: R2Config) -> StorageResult<Self> {
        if config.public_base_url.trim().is_empty() {
            return Err(StorageError::config_error("public base URL is empty"));
        }

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(R2Config::from_env()?)
    }
}

#[async_trait]
impl ObjectStorage for R2Client {
    async fn upload(&self, bytes: Vec<u8>, folder: &str, mime_type: &str) -> StorageResult<String> {
        let key = object_key(folder, mime_type)?;
        let size = bytes.len();
        debug!("Uploading {} bytes to {}", size, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!(key = %key, size, "Uploaded object");
        Ok(public_url(&self.public_base_url, &key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        let key = object_key("videos", "video/mp4").unwrap();
        let (folder, file) = key.split_once('/').unwrap();
        assert_eq!(folder, "videos");
        let (id, ext) = file.split_once('.').unwrap();
        assert!(Uuid::parse_str(id).is_ok());
        assert_eq!(ext, "mp4");
    }

    #[test]
    fn test_object_key_trims_slashes() {
        let key = object_key("/books/2024/", "application/epub+zip").unwrap();
        assert!(key.starts_with("books/2024/"));
        assert!(key.ends_with(".epub"));
    }

    #[test]
    fn test_object_key_rejects_bad_folders() {
        assert!(object_key("", "video/mp4").is_err());
        assert!(object_key("a/../b", "video/mp4").is_err());
        assert!(object_key("a//b", "video/mp4").is_err());
    }

    #[test]
    fn test_public_url_join() {
        assert_eq!(
            public_url("https://cdn.example.com/", "/videos/a.mp4"),
            "https://cdn.example.com/videos/a.mp4"
        );
    }

    #[test]
    fn test_new_requires_public_base_url() {
        let config = R2Config {
            endpoint_url: "http://localhost:9000".into(),
            access_key_id: "key".into(),
            secret_access_key: "secret".into(),
            bucket_name: "bucket".into(),
            region: "auto".into(),
            public_base_url: "".into(),
        };
        assert!(R2Client::new(config).is_err());
    }
}
