use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Acceptance record written when an order enters the processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub order_id: String,
    #[serde(default)]
    pub processed: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Progress document the external pipeline keeps for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatusRecord {
    pub id: String,
    pub order_id: String,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default)]
    pub steps: BTreeMap<String, StepState>,
    pub queued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub status: Option<String>,
    pub result: Option<StepResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub message: Option<String>,
}

pub(crate) fn unknown_status() -> String {
    "unknown".to_string()
}

impl ProcessingStatusRecord {
    /// Status reported for `step`, `"unknown"` when the step or its status is
    /// absent or empty.
    pub fn step_status(&self, step: &str) -> &str {
        self.steps
            .get(step)
            .and_then(|s| s.status.as_deref())
            .filter(|status| !status.is_empty())
            .unwrap_or("unknown")
    }

    pub fn step_error(&self, step: &str) -> Option<&str> {
        self.steps
            .get(step)
            .and_then(|s| s.result.as_ref())
            .and_then(|r| r.message.as_deref())
            .filter(|message| !message.is_empty())
    }
}
