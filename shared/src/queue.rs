use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::records::{ProcessingStatusRecord, SubmissionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 5] = [
        QueueStatus::Queued,
        QueueStatus::Processing,
        QueueStatus::Completed,
        QueueStatus::Failed,
        QueueStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Unknown => "unknown",
        }
    }
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized value '{0}'")]
pub struct UnrecognizedValue(pub String);

impl FromStr for QueueStatus {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnrecognizedValue(s.to_string()))
    }
}

impl FromStr for Priority {
    type Err = UnrecognizedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnrecognizedValue(s.to_string()))
    }
}

/// Keys of the two pipeline stages inside `ProcessingStatusRecord::steps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepNames {
    /// Image enhancement stage.
    pub enhancement: String,
    /// Print fulfillment stage.
    pub fulfillment: String,
}

impl StepNames {
    pub fn new(enhancement: impl Into<String>, fulfillment: impl Into<String>) -> Self {
        Self {
            enhancement: enhancement.into(),
            fulfillment: fulfillment.into(),
        }
    }
}

impl Default for StepNames {
    fn default() -> Self {
        Self::new("topaz", "lumaprint")
    }
}

/// Copy of the matched processing record, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSnapshot {
    pub status: String,
    pub enhancement_status: String,
    pub fulfillment_status: String,
    pub enhancement_error: Option<String>,
    pub fulfillment_error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub order_id: String,
    pub status: QueueStatus,
    pub priority: Priority,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed: bool,
    pub processing_data: Option<ProcessingSnapshot>,
}

impl ProcessingSnapshot {
    pub fn from_record(record: &ProcessingStatusRecord, steps: &StepNames) -> Self {
        Self {
            status: record.status.clone(),
            enhancement_status: record.step_status(&steps.enhancement).to_string(),
            fulfillment_status: record.step_status(&steps.fulfillment).to_string(),
            enhancement_error: record.step_error(&steps.enhancement).map(str::to_string),
            fulfillment_error: record.step_error(&steps.fulfillment).map(str::to_string),
            completed_at: record.completed_at,
            queued_at: record.queued_at,
        }
    }
}

/// Status and priority of a processed order with a matching pipeline record.
///
/// Failure wins over an in-flight step, which wins over completion, whatever
/// the overall field claims.
fn classify(record: &ProcessingStatusRecord, steps: &StepNames) -> (QueueStatus, Priority) {
    let enhancement = record.step_status(&steps.enhancement);
    let fulfillment = record.step_status(&steps.fulfillment);

    if record.status == "failed" || enhancement == "failed" || fulfillment == "failed" {
        (QueueStatus::Failed, Priority::High)
    } else if enhancement == "processing" || fulfillment == "processing" {
        (QueueStatus::Processing, Priority::Medium)
    } else {
        (QueueStatus::Completed, Priority::Low)
    }
}

/// Derive the queue item for one submission.
pub fn derive_queue_item(
    submission: &SubmissionRecord,
    record: Option<&ProcessingStatusRecord>,
    steps: &StepNames,
) -> QueueItem {
    let (status, priority, processing_data) = match (submission.processed, record) {
        (false, _) => (QueueStatus::Queued, Priority::Medium, None),
        (true, None) => (QueueStatus::Unknown, Priority::Medium, None),
        (true, Some(record)) => {
            let (status, priority) = classify(record, steps);
            (status, priority, Some(ProcessingSnapshot::from_record(record, steps)))
        }
    };

    QueueItem {
        id: submission.id.clone(),
        order_id: submission.order_id.clone(),
        status,
        priority,
        created_at: submission.created_at,
        processed_at: submission.processed_at,
        processed: submission.processed,
        processing_data,
    }
}

/// Merge both collections into one queue item per submission, in submission order.
pub fn reconcile(
    submissions: &[SubmissionRecord],
    records: &[ProcessingStatusRecord],
    steps: &StepNames,
) -> Vec<QueueItem> {
    let mut by_order: HashMap<&str, &ProcessingStatusRecord> = HashMap::with_capacity(records.len());
    for record in records {
        by_order.entry(record.order_id.as_str()).or_insert(record);
    }

    submissions
        .iter()
        .map(|submission| {
            let record = by_order.get(submission.order_id.as_str()).copied();
            derive_queue_item(submission, record, steps)
        })
        .collect()
}

/// Per-status and per-priority counts over a reconciled queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub total: usize,
    pub by_status: HashMap<QueueStatus, usize>,
    pub by_priority: HashMap<Priority, usize>,
}

impl QueueCounts {
    pub fn tally(items: &[QueueItem]) -> Self {
        let mut counts = QueueCounts {
            total: items.len(),
            by_status: QueueStatus::ALL.into_iter().map(|s| (s, 0)).collect(),
            by_priority: Priority::ALL.into_iter().map(|p| (p, 0)).collect(),
        };
        for item in items {
            *counts.by_status.entry(item.status).or_default() += 1;
            *counts.by_priority.entry(item.priority).or_default() += 1;
        }
        counts
    }

    pub fn status(&self, status: QueueStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn priority(&self, priority: Priority) -> usize {
        self.by_priority.get(&priority).copied().unwrap_or(0)
    }
}
