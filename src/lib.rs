// lib.rs - uMedia portfolio: prompt-to-video generation and the local portfolio it fills
pub mod client;
pub mod config;
pub mod error;
pub mod gemini_client;
pub mod jobs;
pub mod logging;
pub mod media;
pub mod portfolio;
#[cfg(test)]
mod test_http;
pub mod types;
pub mod workflow;

// Re-export commonly used types for convenience
pub use client::{GenerationClient, JobHandle};
pub use error::{GenerationError, PortfolioError, StartRejected};
pub use media::MediaFetcher;
pub use portfolio::PortfolioStore;
pub use types::*;
pub use workflow::{GenerationWorkflow, WorkflowStatus};
