// src/gemini_client.rs
//! Gemini Veo implementation of the generation capability (REST, long-running operations)

use crate::client::{GenerationClient, JobHandle};
use crate::config::VeoConfig;
use crate::error::GenerationError;
use crate::types::Credential;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    aspect_ratio: String,
    request_timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictLongRunningRequest {
    pub instances: Vec<VideoInstance>,
    pub parameters: VideoParameters,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoInstance {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoParameters {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: String,
    #[serde(rename = "numberOfVideos", skip_serializing_if = "Option::is_none")]
    pub number_of_videos: Option<u32>,
}

impl GeminiClient {
    pub fn new(config: &VeoConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            aspect_ratio: config.aspect_ratio.clone(),
            request_timeout: config.request_timeout,
        }
    }

    fn build_request(&self, prompt: &str) -> PredictLongRunningRequest {
        PredictLongRunningRequest {
            instances: vec![VideoInstance {
                prompt: prompt.to_string(),
            }],
            parameters: VideoParameters {
                aspect_ratio: self.aspect_ratio.clone(),
                number_of_videos: Some(1),
            },
        }
    }

    async fn read_operation(response: Response) -> Result<JobHandle, GenerationError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!("Veo API error ({}): {}", status, body);
            return Err(error_for_status(status, &body));
        }

        tracing::debug!("Veo API response (truncated): {}...", &body[..floor_char_boundary(&body, 500)]);

        serde_json::from_str::<JobHandle>(&body).map_err(|e| {
            tracing::error!("Failed to parse Veo operation: {}", e);
            GenerationError::Transport(format!("error decoding response body: {}", e))
        })
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn submit(&self, prompt: &str, credential: &Credential) -> Result<JobHandle, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::Validation("prompt must not be empty".to_string()));
        }

        let url = format!("{}/models/{}:predictLongRunning", self.base_url, self.model);
        let request = self.build_request(prompt);

        tracing::info!("🎬 Submitting Veo generation (model: {}, aspect: {})", self.model, self.aspect_ratio);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.expose())
            .header("Content-Type", "application/json")
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        let handle = Self::read_operation(response).await?;
        if handle.name.is_empty() {
            return Err(GenerationError::Transport("operation name missing from response".to_string()));
        }
        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle, credential: &Credential) -> Result<JobHandle, GenerationError> {
        let url = format!("{}/{}", self.base_url, handle.name);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", credential.expose())
            .timeout(self.request_timeout)
            .send()
            .await?;

        let mut refreshed = Self::read_operation(response).await?;
        // Some responses omit the name; the job identity never changes.
        if refreshed.name.is_empty() {
            refreshed.name = handle.name.clone();
        }
        Ok(refreshed)
    }
}

/// Map an unsuccessful submit/poll status onto the error taxonomy.
/// An unknown model or an expired operation (404/410) is a transport failure here.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> GenerationError {
    let detail = api_error_message(body).unwrap_or_else(|| format!("HTTP {}", status));
    match status {
        StatusCode::BAD_REQUEST => GenerationError::Validation(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(detail),
        _ => GenerationError::Transport(detail),
    }
}

/// `{"error": {"message": ...}}` as returned by Google APIs
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.pointer("/error/message")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string())
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::CannedServer;

    fn client() -> GeminiClient {
        GeminiClient::new(&VeoConfig::default())
    }

    fn client_for(server: &CannedServer) -> GeminiClient {
        GeminiClient::new(&VeoConfig {
            base_url: server.url(),
            model: "veo-x".to_string(),
            ..VeoConfig::default()
        })
    }

    fn key() -> Credential {
        Credential::new("secret-key").unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let request = client().build_request("A rabbit in a forest");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instances"][0]["prompt"], "A rabbit in a forest");
        assert_eq!(json["parameters"]["aspectRatio"], "9:16");
        assert_eq!(json["parameters"]["numberOfVideos"], 1);
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"error":{"code":400,"message":"Prompt too long"}}"#;
        assert_eq!(
            error_for_status(StatusCode::BAD_REQUEST, body),
            GenerationError::Validation("Prompt too long".to_string())
        );
        assert!(matches!(error_for_status(StatusCode::FORBIDDEN, ""), GenerationError::Auth(_)));
        assert!(matches!(error_for_status(StatusCode::UNAUTHORIZED, ""), GenerationError::Auth(_)));
        assert!(matches!(error_for_status(StatusCode::GONE, ""), GenerationError::Transport(_)));
        assert!(matches!(error_for_status(StatusCode::NOT_FOUND, ""), GenerationError::Transport(_)));
        assert_eq!(
            error_for_status(StatusCode::SERVICE_UNAVAILABLE, "oops"),
            GenerationError::Transport("HTTP 503 Service Unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_prompt_before_network() {
        let credential = Credential::new("key").unwrap();
        let err = client().submit("   ", &credential).await.unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
    }

    #[test]
    fn test_floor_char_boundary() {
        assert_eq!(floor_char_boundary("abc", 500), 3);
        let s = "æøå";
        assert!(s.is_char_boundary(floor_char_boundary(s, 3)));
    }

    #[tokio::test]
    async fn test_submit_returns_operation_handle() {
        let server = CannedServer::start(vec![(200, r#"{"name":"models/veo-x/operations/op1"}"#)]).await;

        let handle = client_for(&server).submit("  A rabbit in a forest ", &key()).await.unwrap();
        assert_eq!(handle, JobHandle::pending("models/veo-x/operations/op1"));

        let requests = server.requests().await;
        assert!(requests[0].starts_with("POST /models/veo-x:predictLongRunning "));
        assert!(requests[0].to_lowercase().contains("x-goog-api-key: secret-key"));
    }

    #[tokio::test]
    async fn test_submit_unknown_model_is_transport_error() {
        let server = CannedServer::start(vec![(404, r#"{"error":{"message":"models/veo-x is not found"}}"#)]).await;

        let err = client_for(&server).submit("A rabbit", &key()).await.unwrap_err();
        assert_eq!(err, GenerationError::Transport("models/veo-x is not found".to_string()));
    }

    #[tokio::test]
    async fn test_submit_maps_rejections() {
        let server = CannedServer::start(vec![
            (400, r#"{"error":{"message":"Prompt too long"}}"#),
            (403, r#"{"error":{"message":"API key not valid"}}"#),
            (500, ""),
        ])
        .await;
        let client = client_for(&server);

        assert_eq!(
            client.submit("A rabbit", &key()).await.unwrap_err(),
            GenerationError::Validation("Prompt too long".to_string())
        );
        assert_eq!(
            client.submit("A rabbit", &key()).await.unwrap_err(),
            GenerationError::Auth("API key not valid".to_string())
        );
        assert_eq!(
            client.submit("A rabbit", &key()).await.unwrap_err(),
            GenerationError::Transport("HTTP 500 Internal Server Error".to_string())
        );
    }

    #[tokio::test]
    async fn test_submit_without_operation_name_is_rejected() {
        let server = CannedServer::start(vec![(200, "{}")]).await;

        let err = client_for(&server).submit("A rabbit", &key()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(ref m) if m.contains("operation name")));
    }

    #[tokio::test]
    async fn test_poll_keeps_name_when_response_omits_it() {
        let server = CannedServer::start(vec![(
            200,
            r#"{"done":true,"response":{"generateVideoResponse":{"generatedSamples":[{"video":{"uri":"files/v1:download"}}]}}}"#,
        )])
        .await;
        let pending = JobHandle::pending("models/veo-x/operations/op1");

        let refreshed = client_for(&server).poll(&pending, &key()).await.unwrap();
        assert_eq!(refreshed.name, "models/veo-x/operations/op1");
        assert!(refreshed.done);
        assert_eq!(refreshed.video_uri(), Some("files/v1:download"));

        let requests = server.requests().await;
        assert!(requests[0].starts_with("GET /models/veo-x/operations/op1 "));
    }

    #[tokio::test]
    async fn test_poll_expired_operation_is_transport_error() {
        let server = CannedServer::start(vec![(410, "")]).await;

        let err = client_for(&server)
            .poll(&JobHandle::pending("operations/old"), &key())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_malformed_operation_is_decode_error() {
        let server = CannedServer::start(vec![(200, "<html>not json</html>")]).await;

        let err = client_for(&server)
            .poll(&JobHandle::pending("operations/op1"), &key())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Transport(ref m) if m.contains("error decoding response body")));
    }
}
