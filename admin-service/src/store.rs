//! Point reads and full scans the queue view and login depend on.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use shared::*;

use crate::error::StoreResult;
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

/// Read access to the collections backing the queue and session views.
///
/// A missing document is `Ok(None)`; only a failed read is an error.
#[async_trait]
pub trait ReadStore: Send + Sync {
    async fn list_submissions(&self) -> StoreResult<Vec<SubmissionRecord>>;

    async fn list_processing_records(&self) -> StoreResult<Vec<ProcessingStatusRecord>>;

    async fn find_submission(&self, order_id: &str) -> StoreResult<Option<SubmissionRecord>>;

    async fn find_processing_record(&self, order_id: &str) -> StoreResult<Option<ProcessingStatusRecord>>;

    async fn find_order(&self, id: &str) -> StoreResult<Option<Order>>;

    async fn find_product(&self, id: &str) -> StoreResult<Option<Product>>;

    async fn find_user(&self, id: &str) -> StoreResult<Option<UserProfile>>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadStore for PgStore {
    async fn list_submissions(&self) -> StoreResult<Vec<SubmissionRecord>> {
        let mut conn = self.pool.get().await?;

        let rows = order_requests::table
            .order(order_requests::created_at.desc())
            .load::<DbOrderRequest>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(SubmissionRecord::from).collect())
    }

    async fn list_processing_records(&self) -> StoreResult<Vec<ProcessingStatusRecord>> {
        let mut conn = self.pool.get().await?;

        let rows = order_processing_queue::table
            .order(order_processing_queue::id.asc())
            .load::<DbProcessingRecord>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(ProcessingStatusRecord::from).collect())
    }

    async fn find_submission(&self, order_id: &str) -> StoreResult<Option<SubmissionRecord>> {
        let mut conn = self.pool.get().await?;

        let row = order_requests::table
            .filter(order_requests::order_id.eq(order_id))
            .order(order_requests::id.asc())
            .first::<DbOrderRequest>(&mut conn)
            .await
            .optional()?;

        Ok(row.map(SubmissionRecord::from))
    }

    async fn find_processing_record(&self, order_id: &str) -> StoreResult<Option<ProcessingStatusRecord>> {
        let mut conn = self.pool.get().await?;

        let row = order_processing_queue::table
            .filter(order_processing_queue::order_id.eq(order_id))
            .order(order_processing_queue::id.asc())
            .first::<DbProcessingRecord>(&mut conn)
            .await
            .optional()?;

        Ok(row.map(ProcessingStatusRecord::from))
    }

    async fn find_order(&self, id: &str) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.get().await?;

        let row = orders::table
            .find(id)
            .first::<DbOrder>(&mut conn)
            .await
            .optional()?;

        row.map(Order::try_from).transpose()
    }

    async fn find_product(&self, id: &str) -> StoreResult<Option<Product>> {
        let mut conn = self.pool.get().await?;

        let row = products::table
            .find(id)
            .first::<DbProduct>(&mut conn)
            .await
            .optional()?;

        Ok(row.map(Product::from))
    }

    async fn find_user(&self, id: &str) -> StoreResult<Option<UserProfile>> {
        let mut conn = self.pool.get().await?;

        let row = users::table
            .find(id)
            .first::<DbUser>(&mut conn)
            .await
            .optional()?;

        Ok(row.map(UserProfile::from))
    }
}
