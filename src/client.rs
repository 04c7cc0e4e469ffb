// src/client.rs
//! Capability boundary to the external video-generation service.
//!
//! The workflow only relies on the calling contract below: `poll` may be
//! called any number of times for the same job without restarting it, and a
//! handle only ever moves towards `done`.

use crate::error::GenerationError;
use crate::types::{Credential, MediaLocator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error reported by the service for a finished-but-failed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Snapshot of a long-running generation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl JobHandle {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: false,
            response: None,
            error: None,
        }
    }

    /// Finished job carrying one generated video
    pub fn completed(name: impl Into<String>, video_uri: &str) -> Self {
        Self {
            name: name.into(),
            done: true,
            response: Some(serde_json::json!({
                "generateVideoResponse": {
                    "generatedSamples": [{ "video": { "uri": video_uri } }]
                }
            })),
            error: None,
        }
    }

    /// Finished job without any video
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            done: true,
            response: None,
            error: Some(OperationError {
                code: 0,
                message: message.into(),
            }),
        }
    }

    /// First generated video URI, accepting both the REST shape
    /// (`generateVideoResponse.generatedSamples`) and the SDK shape
    /// (`generatedVideos`).
    pub fn video_uri(&self) -> Option<&str> {
        let response = self.response.as_ref()?;
        let samples = response
            .pointer("/generateVideoResponse/generatedSamples")
            .or_else(|| response.get("generatedVideos"))?;
        samples
            .as_array()?
            .first()?
            .pointer("/video/uri")?
            .as_str()
            .filter(|uri| !uri.is_empty())
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Start a new generation job for `prompt`
    async fn submit(&self, prompt: &str, credential: &Credential) -> Result<JobHandle, GenerationError>;

    /// Refresh the state of an existing job
    async fn poll(&self, handle: &JobHandle, credential: &Credential) -> Result<JobHandle, GenerationError>;

    fn is_done(&self, handle: &JobHandle) -> bool {
        handle.done
    }

    /// Locator of the generated media, `None` if the finished job produced nothing
    fn resolve_locator(&self, handle: &JobHandle) -> Option<MediaLocator> {
        handle.video_uri().map(MediaLocator::new)
    }

    /// Service-supplied explanation for a finished job without media
    fn failure_reason(&self, handle: &JobHandle) -> Option<String> {
        handle
            .error
            .as_ref()
            .map(|e| e.message.clone())
            .filter(|m| !m.is_empty())
    }
}
