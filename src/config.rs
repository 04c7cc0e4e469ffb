// src/config.rs
//! Environment-driven configuration (`.env` is loaded by the binary via dotenvy)

use crate::types::Credential;
use crate::workflow::WorkflowConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "veo-3.1-fast-generate-preview";
pub const DEFAULT_ASPECT_RATIO: &str = "9:16";
pub const DEFAULT_DATA_DIR: &str = "umedia-data";

/// Settings for the Veo generation endpoint
#[derive(Debug, Clone)]
pub struct VeoConfig {
    pub base_url: String,
    pub model: String,
    pub aspect_ratio: String,
    pub request_timeout: Duration,
}

impl Default for VeoConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Missing keys are not an error here; the workflow reports them when first needed.
    pub credential: Option<Credential>,
    pub veo: VeoConfig,
    pub workflow: WorkflowConfig,
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential = lookup("GEMINI_API_KEY")
            .and_then(Credential::new)
            .or_else(|| lookup("API_KEY").and_then(Credential::new));

        let defaults = VeoConfig::default();
        let veo = VeoConfig {
            base_url: lookup("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            model: lookup("VEO_MODEL").unwrap_or(defaults.model),
            aspect_ratio: lookup("VEO_ASPECT_RATIO").unwrap_or(defaults.aspect_ratio),
            request_timeout: defaults.request_timeout,
        };

        let mut workflow = WorkflowConfig::default();
        if let Some(raw) = lookup("UMEDIA_POLL_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => workflow.poll_interval = Duration::from_secs(secs),
                _ => tracing::warn!(
                    "Ignoring invalid UMEDIA_POLL_INTERVAL_SECS={:?}, using {}s",
                    raw,
                    workflow.poll_interval.as_secs()
                ),
            }
        }

        let data_dir = lookup("UMEDIA_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        Self {
            credential,
            veo,
            workflow,
            data_dir,
        }
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}
