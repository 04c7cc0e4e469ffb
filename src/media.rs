// src/media.rs
//! Materializes remote media locators into local files

use crate::error::GenerationError;
use crate::gemini_client::api_error_message;
use crate::types::{Credential, LocalReference, MediaLocator};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `locator` and return a reference that can be used without network access
    async fn materialize(
        &self,
        locator: &MediaLocator,
        credential: &Credential,
    ) -> Result<LocalReference, GenerationError>;
}

/// Downloads media over HTTP into a content-addressed media directory
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    media_dir: PathBuf,
    base_url: String,
    download_timeout: Duration,
}

impl HttpMediaFetcher {
    pub fn new(media_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            media_dir: media_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            download_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Absolute download URL with the API key attached as the `key` query parameter
    pub(crate) fn download_url(&self, locator: &MediaLocator, credential: &Credential) -> String {
        let uri = locator.as_str();
        let absolute = if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            format!("{}/{}", self.base_url, uri.trim_start_matches('/'))
        };
        let separator = if absolute.contains('?') { '&' } else { '?' };
        format!(
            "{}{}key={}",
            absolute,
            separator,
            urlencoding::encode(credential.expose())
        )
    }

    pub(crate) fn media_path(&self, bytes: &[u8]) -> PathBuf {
        let digest = hex::encode(Sha256::digest(bytes));
        self.media_dir.join(format!("{}.mp4", digest))
    }

    async fn store(&self, bytes: &[u8]) -> Result<PathBuf, GenerationError> {
        let path = self.media_path(bytes);
        if fs::try_exists(&path).await.unwrap_or(false) {
            info!("♻️ Media already stored at {}", path.display());
            return Ok(path);
        }

        fs::create_dir_all(&self.media_dir).await.map_err(|e| {
            GenerationError::Transport(format!("failed to create media directory: {}", e))
        })?;

        write_atomically(&path, bytes).await.map_err(|e| {
            GenerationError::Transport(format!("failed to store media: {}", e))
        })?;
        Ok(path)
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn materialize(
        &self,
        locator: &MediaLocator,
        credential: &Credential,
    ) -> Result<LocalReference, GenerationError> {
        info!("⬇️ Downloading generated video: {}", locator);

        let response = self
            .client
            .get(self.download_url(locator, credential))
            .timeout(self.download_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Failed to download video: {}", status);
            let detail = api_error_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => GenerationError::NotFound(detail),
                _ => GenerationError::Transport(format!("Failed to download video: {}", detail)),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenerationError::Transport("downloaded video is empty".to_string()));
        }

        let path = self.store(&bytes).await?;
        info!("✅ Downloaded video ({} bytes) to: {}", bytes.len(), path.display());
        Ok(LocalReference::new(path.to_string_lossy()))
    }
}

/// Concurrent writers of the same content each use their own temp file.
async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.{}.part", file_name, Uuid::new_v4()));
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await
}
