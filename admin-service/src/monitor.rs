use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{error, info, warn};

use crate::queue_view::QueueView;

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSummary {
    pub counts: QueueCounts,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub type SummaryHandle = Arc<RwLock<QueueSummary>>;

/// Periodically reconciles the queue, keeping per-status counts current and
/// logging orders that newly entered the failed state.
pub struct QueueMonitor {
    view: QueueView,
    summary: SummaryHandle,
    interval: Duration,
    known_failures: HashSet<String>,
}

impl QueueMonitor {
    pub fn new(view: QueueView, summary: SummaryHandle, interval: Duration) -> Self {
        Self {
            view,
            summary,
            interval,
            known_failures: HashSet::new(),
        }
    }

    pub async fn run(mut self) {
        let mut interval = time::interval(self.interval);

        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }

    pub async fn refresh(&mut self) {
        match self.view.load_items().await {
            Ok(items) => {
                self.report_new_failures(&items);
                let counts = QueueCounts::tally(&items);
                info!(
                    "Queue refreshed: {} items ({} queued, {} processing, {} failed, {} unknown)",
                    counts.total,
                    counts.status(QueueStatus::Queued),
                    counts.status(QueueStatus::Processing),
                    counts.status(QueueStatus::Failed),
                    counts.status(QueueStatus::Unknown),
                );

                let mut summary = self.summary.write().await;
                summary.counts = counts;
                summary.refreshed_at = Some(Utc::now());
                summary.last_error = None;
            }
            Err(e) => {
                error!("Error refreshing processing queue: {}", e);
                self.summary.write().await.last_error = Some(e.to_string());
            }
        }
    }

    fn report_new_failures(&mut self, items: &[QueueItem]) {
        let failed: HashSet<String> = items
            .iter()
            .filter(|item| item.status == QueueStatus::Failed)
            .map(|item| item.order_id.clone())
            .collect();

        for item in items.iter().filter(|i| i.status == QueueStatus::Failed) {
            if self.known_failures.contains(&item.order_id) {
                continue;
            }
            let data = item.processing_data.as_ref();
            warn!(
                "Order {} failed processing (overall: {}, enhancement: {}, fulfillment: {})",
                item.order_id,
                data.map(|d| d.status.as_str()).unwrap_or("unknown"),
                data.and_then(|d| d.enhancement_error.as_deref()).unwrap_or("-"),
                data.and_then(|d| d.fulfillment_error.as_deref()).unwrap_or("-"),
            );
        }

        self.known_failures = failed;
    }

    #[cfg(test)]
    fn known_failures(&self) -> &HashSet<String> {
        &self.known_failures
    }
}
