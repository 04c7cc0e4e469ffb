// Workflow module - generation state machine and its status type
pub mod generation;
pub mod state;

pub use generation::{GenerationTask, GenerationWorkflow, WorkflowConfig, DEFAULT_POLL_INTERVAL};
pub use state::WorkflowStatus;
