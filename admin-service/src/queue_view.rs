use futures::future::join_all;
use serde::{Deserialize, Serialize};
use shared::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::ReadStore;

/// A queue item joined with its order and the customer who placed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDetail {
    #[serde(flatten)]
    pub item: QueueItem,
    pub order: Option<OrderAggregate>,
    pub user: Option<UserProfile>,
}

/// Builds the processing-queue view from the submission and pipeline collections.
#[derive(Clone)]
pub struct QueueView {
    store: Arc<dyn ReadStore>,
    steps: StepNames,
    unknown_recheck: Duration,
}

impl QueueView {
    pub fn new(store: Arc<dyn ReadStore>, steps: StepNames, unknown_recheck: Duration) -> Self {
        Self {
            store,
            steps,
            unknown_recheck,
        }
    }

    /// Full reconciled queue, one item per submission.
    pub async fn load_items(&self) -> StoreResult<Vec<QueueItem>> {
        let (submissions, records) = futures::try_join!(
            self.store.list_submissions(),
            self.store.list_processing_records()
        )?;

        debug!(
            "Reconciling {} submissions against {} processing records",
            submissions.len(),
            records.len()
        );

        Ok(reconcile(&submissions, &records, &self.steps))
    }

    pub async fn list(&self, query: &QueueQuery) -> StoreResult<Vec<QueueItem>> {
        let items = self.load_items().await?;
        Ok(query.apply(items))
    }

    /// Queue item for `order_id` with its order aggregate and customer profile.
    ///
    /// `Ok(None)` when no submission references the order.
    pub async fn load_queue_detail(&self, order_id: &str) -> StoreResult<Option<QueueDetail>> {
        let (submission, record, order) = futures::try_join!(
            self.store.find_submission(order_id),
            self.store.find_processing_record(order_id),
            self.find_readable_order(order_id)
        )?;

        let Some(submission) = submission else {
            return Ok(None);
        };

        let mut item = derive_queue_item(&submission, record.as_ref(), &self.steps);
        if item.status == QueueStatus::Unknown && !self.unknown_recheck.is_zero() {
            item = self.recheck_unknown(&submission, item).await?;
        }

        let (order, user) = match order {
            Some(order) => {
                let (products, user) = futures::join!(
                    enrich_line_items(self.store.as_ref(), &order.products),
                    self.find_user_or_none(&order.user_id)
                );
                (Some(OrderAggregate::new(order, products)), user)
            }
            None => {
                warn!("Queue item {} references missing order {}", submission.id, order_id);
                (None, None)
            }
        };

        Ok(Some(QueueDetail { item, order, user }))
    }

    // The pipeline may flip `processed` before its status document is visible.
    async fn recheck_unknown(&self, submission: &SubmissionRecord, item: QueueItem) -> StoreResult<QueueItem> {
        tokio::time::sleep(self.unknown_recheck).await;

        match self.store.find_processing_record(&submission.order_id).await? {
            Some(record) => {
                info!("Processing record for order {} appeared on recheck", submission.order_id);
                Ok(derive_queue_item(submission, Some(&record), &self.steps))
            }
            None => Ok(item),
        }
    }

    async fn find_readable_order(&self, order_id: &str) -> StoreResult<Option<Order>> {
        match self.store.find_order(order_id).await {
            Err(e @ StoreError::Malformed { .. }) => {
                warn!("Showing queue item without its order: {}", e);
                Ok(None)
            }
            result => result,
        }
    }

    async fn find_user_or_none(&self, user_id: &str) -> Option<UserProfile> {
        match self.store.find_user(user_id).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                warn!("User {} not found", user_id);
                None
            }
            Err(e) => {
                warn!("Failed to load user {}: {}", user_id, e);
                None
            }
        }
    }
}

/// Joins every line item to its product; a line item whose product is
/// missing or unreadable keeps `product_details: None`.
pub async fn enrich_line_items(store: &dyn ReadStore, items: &[LineItem]) -> Vec<EnrichedLineItem> {
    join_all(items.iter().cloned().map(|item| async move {
        let product_details = match item.product_id.as_deref() {
            Some(product_id) => match store.find_product(product_id).await {
                Ok(product) => product,
                Err(e) => {
                    warn!("Failed to load product {}: {}", product_id, e);
                    None
                }
            },
            None => None,
        };
        EnrichedLineItem { item, product_details }
    }))
    .await
}

pub async fn enrich_order(store: &dyn ReadStore, order: Order) -> OrderAggregate {
    let products = enrich_line_items(store, &order.products).await;
    OrderAggregate::new(order, products)
}
