// src/error.rs
use thiserror::Error;

/// Failures raised by the generation service, the media fetcher or the
/// workflow itself. Every variant ends up as a `Failed` status message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Media not found: {0}")]
    NotFound(String),
    #[error("No video found in the response: {0}")]
    EmptyResult(String),
}

impl GenerationError {
    pub fn missing_credential() -> Self {
        GenerationError::Auth(
            "no API key configured (set GEMINI_API_KEY or API_KEY)".to_string(),
        )
    }

    /// Short machine-readable kind, used in structured log fields
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation",
            GenerationError::Auth(_) => "auth",
            GenerationError::Transport(_) => "transport",
            GenerationError::NotFound(_) => "not_found",
            GenerationError::EmptyResult(_) => "empty_result",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Transport(format!("timeout: {}", err))
        } else if err.is_decode() {
            GenerationError::Transport(format!("error decoding response body: {}", err))
        } else {
            GenerationError::Transport(err.to_string())
        }
    }
}

/// Why a `start` call was refused without any state transition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRejected {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("workflow has already been started")]
    AlreadyStarted,
}

#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Record {0} is already in the portfolio")]
    DuplicateId(String),
}
