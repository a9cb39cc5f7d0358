//! Dashboard counters and month-over-month trends.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, sum};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::*;

use crate::error::StoreResult;
use crate::schema::*;
use crate::store::DbPool;

const RECENT_PER_KIND: i64 = 5;
const RECENT_TOTAL: usize = 10;

#[derive(Clone)]
pub struct DashboardService {
    pool: DbPool,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    from: DateTime<Utc>,
    until: DateTime<Utc>,
}

impl DashboardService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self) -> StoreResult<DashboardStats> {
        let mut conn = self.pool.get().await?;

        let total_users = users::table.select(count_star()).get_result::<i64>(&mut conn).await?;
        let total_images = images::table.select(count_star()).get_result::<i64>(&mut conn).await?;
        let total_products = products::table.select(count_star()).get_result::<i64>(&mut conn).await?;
        let total_orders = orders::table.select(count_star()).get_result::<i64>(&mut conn).await?;
        let total_earnings = orders::table
            .select(sum(orders::total_amount))
            .get_result::<Option<BigDecimal>>(&mut conn)
            .await?
            .unwrap_or_default();

        let latest_orders = orders::table
            .select((orders::id, orders::created_at))
            .order(orders::created_at.desc())
            .limit(RECENT_PER_KIND)
            .load::<(String, DateTime<Utc>)>(&mut conn)
            .await?;
        let latest_images = images::table
            .select((images::id, images::created_at))
            .order(images::created_at.desc())
            .limit(RECENT_PER_KIND)
            .load::<(String, DateTime<Utc>)>(&mut conn)
            .await?;

        let activity = latest_orders
            .iter()
            .map(|(id, at)| Activity::order_completed(id, *at))
            .chain(latest_images.iter().map(|(id, at)| Activity::image_generated(id, *at)))
            .collect();

        Ok(DashboardStats {
            total_users,
            total_images,
            total_products,
            total_orders,
            total_earnings,
            recent_activity: merge_recent(activity, RECENT_TOTAL),
        })
    }

    pub async fn trends(&self, now: DateTime<Utc>) -> StoreResult<DashboardTrends> {
        let mut conn = self.pool.get().await?;
        let months = month_windows(now);
        let current = Window {
            from: months.this_month_start,
            until: months.next_month_start,
        };
        let previous = Window {
            from: months.last_month_start,
            until: months.this_month_start,
        };

        let users_now = count_users(&mut conn, current).await?;
        let users_before = count_users(&mut conn, previous).await?;
        let images_now = count_images(&mut conn, current).await?;
        let images_before = count_images(&mut conn, previous).await?;
        let orders_now = count_orders(&mut conn, current).await?;
        let orders_before = count_orders(&mut conn, previous).await?;
        let products_now = count_products(&mut conn, current).await?;
        let products_before = count_products(&mut conn, previous).await?;
        let earnings_now = earnings(&mut conn, current).await?;
        let earnings_before = earnings(&mut conn, previous).await?;

        Ok(DashboardTrends {
            total_users: Trend::between(users_now as f64, users_before as f64),
            total_images: Trend::between(images_now as f64, images_before as f64),
            total_orders: Trend::between(orders_now as f64, orders_before as f64),
            total_products: Trend::between(products_now as f64, products_before as f64),
            total_earnings: Trend::between_amounts(&earnings_now, &earnings_before),
        })
    }
}

async fn count_users(conn: &mut AsyncPgConnection, window: Window) -> StoreResult<i64> {
    Ok(users::table
        .filter(users::created_at.ge(window.from).and(users::created_at.lt(window.until)))
        .select(count_star())
        .get_result(conn)
        .await?)
}

async fn count_images(conn: &mut AsyncPgConnection, window: Window) -> StoreResult<i64> {
    Ok(images::table
        .filter(images::created_at.ge(window.from).and(images::created_at.lt(window.until)))
        .select(count_star())
        .get_result(conn)
        .await?)
}

async fn count_orders(conn: &mut AsyncPgConnection, window: Window) -> StoreResult<i64> {
    Ok(orders::table
        .filter(orders::created_at.ge(window.from).and(orders::created_at.lt(window.until)))
        .select(count_star())
        .get_result(conn)
        .await?)
}

async fn count_products(conn: &mut AsyncPgConnection, window: Window) -> StoreResult<i64> {
    Ok(products::table
        .filter(products::created_at.ge(window.from).and(products::created_at.lt(window.until)))
        .select(count_star())
        .get_result(conn)
        .await?)
}

async fn earnings(conn: &mut AsyncPgConnection, window: Window) -> StoreResult<BigDecimal> {
    let total: Option<BigDecimal> = orders::table
        .filter(orders::created_at.ge(window.from).and(orders::created_at.lt(window.until)))
        .select(sum(orders::total_amount))
        .get_result(conn)
        .await?;
    Ok(total.unwrap_or_default())
}
