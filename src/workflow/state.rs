// WorkflowStatus - transient state of one generation attempt
use crate::types::RecordId;
use serde::{Deserialize, Serialize};

/// Status of a single generation workflow instance.
///
/// Transitions only move forward:
/// `Idle → Submitting → Polling → Resolving → Committed`, with `Failed` and
/// `Cancelled` reachable from any non-terminal state after `Idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Submitting,
    Polling {
        message: String,
    },
    Resolving,
    Committed {
        record_id: RecordId,
    },
    Failed {
        message: String,
    },
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Committed { .. } | WorkflowStatus::Failed { .. } | WorkflowStatus::Cancelled
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "idle",
            WorkflowStatus::Submitting => "submitting",
            WorkflowStatus::Polling { .. } => "polling",
            WorkflowStatus::Resolving => "resolving",
            WorkflowStatus::Committed { .. } => "committed",
            WorkflowStatus::Failed { .. } => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    /// Human-readable line for progress displays
    pub fn message(&self) -> String {
        match self {
            WorkflowStatus::Idle => "Ready".to_string(),
            WorkflowStatus::Submitting => "Starting generation...".to_string(),
            WorkflowStatus::Polling { message } => message.clone(),
            WorkflowStatus::Resolving => "Downloading the generated video...".to_string(),
            WorkflowStatus::Committed { record_id } => format!("Saved to portfolio ({})", record_id),
            WorkflowStatus::Failed { message } => message.clone(),
            WorkflowStatus::Cancelled => "Generation cancelled".to_string(),
        }
    }
}
