//! Writes and paginated listings over the admin collections.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use shared::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::*;
use crate::schema::*;
use crate::store::DbPool;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Keyset page request: the newest `limit` rows strictly after the cursor
/// `(before, before_id)` in `created_at DESC, id DESC` order. Without
/// `before_id` every row created at `before` is excluded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
    pub before_id: Option<String>,
}

impl PageParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

}

/// Position of the last row of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl PageCursor {
    fn new(created_at: DateTime<Utc>, id: &str) -> Self {
        Self {
            created_at,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<PageCursor>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// A full page may have a successor; the cursor is the last row's
    /// `(created_at, id)`.
    pub fn new(data: Vec<T>, limit: i64, cursor: impl Fn(&T) -> PageCursor) -> Self {
        let has_more = data.len() as i64 == limit;
        let next_cursor = data.last().map(cursor);
        Self {
            data,
            next_cursor,
            has_more,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }

    /// Drops rows without moving the cursor, so the next page still starts
    /// after the last row read.
    pub fn filter_map<U>(self, f: impl FnMut(T) -> Option<U>) -> Page<U> {
        Page {
            data: self.data.into_iter().filter_map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}

/// Applies the keyset predicate and ordering of [`PageParams`] to a boxed
/// query over a table with `created_at` and `id` columns.
macro_rules! keyset_page {
    ($table:ident, $params:expr) => {{
        let params: &PageParams = $params;
        let mut query = $table::table
            .order(($table::created_at.desc(), $table::id.desc()))
            .limit(params.limit())
            .into_boxed();
        match (params.before, params.before_id.clone()) {
            (Some(before), Some(before_id)) => {
                query = query.filter(
                    $table::created_at
                        .lt(before)
                        .or($table::created_at.eq(before).and($table::id.lt(before_id))),
                );
            }
            (Some(before), None) => {
                query = query.filter($table::created_at.lt(before));
            }
            (None, _) => {}
        }
        query
    }};
}

/// Converts an order row, logging and skipping it when its line items do
/// not decode.
fn decode_order(row: DbOrder) -> Option<Order> {
    let id = row.id.clone();
    match Order::try_from(row) {
        Ok(order) => Some(order),
        Err(e) => {
            warn!("Skipping order {}: {}", id, e);
            None
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // Users

    pub async fn list_users(&self, params: &PageParams) -> StoreResult<Page<UserProfile>> {
        let mut conn = self.pool.get().await?;
        let limit = params.limit();

        let rows = keyset_page!(users, params)
            .load::<DbUser>(&mut conn)
            .await?;
        Ok(Page::new(rows, limit, |u| PageCursor::new(u.created_at, &u.id)).map(UserProfile::from))
    }

    pub async fn list_admin_users(&self) -> StoreResult<Vec<UserProfile>> {
        let mut conn = self.pool.get().await?;

        let rows = users::table
            .filter(users::is_admin.eq(true))
            .order(users::created_at.desc())
            .load::<DbUser>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }

    pub async fn set_admin(&self, id: &str, is_admin: bool) -> StoreResult<Option<UserProfile>> {
        let mut conn = self.pool.get().await?;

        let row = diesel::update(users::table.find(id))
            .set(users::is_admin.eq(is_admin))
            .get_result::<DbUser>(&mut conn)
            .await
            .optional()?;

        if row.is_some() {
            info!("User {} admin flag set to {}", id, is_admin);
        }
        Ok(row.map(UserProfile::from))
    }

    pub async fn delete_user(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(users::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }

    pub async fn orders_for_user(&self, user_id: &str) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.get().await?;

        let rows = orders::table
            .filter(orders::user_id.eq(user_id))
            .order(orders::created_at.desc())
            .load::<DbOrder>(&mut conn)
            .await?;

        Ok(rows.into_iter().filter_map(decode_order).collect())
    }

    pub async fn images_for_user(&self, user_id: &str) -> StoreResult<Vec<GeneratedImage>> {
        let mut conn = self.pool.get().await?;

        let rows = images::table
            .filter(images::user_id.eq(user_id))
            .order(images::created_at.desc())
            .load::<DbImage>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(GeneratedImage::from).collect())
    }

    // Products

    pub async fn list_products(&self, params: &PageParams) -> StoreResult<Page<Product>> {
        let mut conn = self.pool.get().await?;
        let limit = params.limit();

        let rows = keyset_page!(products, params)
            .load::<DbProduct>(&mut conn)
            .await?;
        Ok(Page::new(rows, limit, |p| PageCursor::new(p.created_at, &p.id)).map(Product::from))
    }

    pub async fn create_product(&self, draft: NewProduct) -> StoreResult<Product> {
        let mut conn = self.pool.get().await?;
        let product = Product {
            id: new_id(),
            name: draft.name,
            description: draft.description,
            price: draft.price,
            image_url: draft.image_url,
            created_at: Utc::now(),
        };

        let row = diesel::insert_into(products::table)
            .values(DbProduct::from(product))
            .get_result::<DbProduct>(&mut conn)
            .await?;

        info!("Created product {}", row.id);
        Ok(row.into())
    }

    pub async fn update_product(&self, id: &str, patch: ProductPatch) -> StoreResult<Option<Product>> {
        let mut conn = self.pool.get().await?;

        let Some(row) = products::table
            .find(id)
            .first::<DbProduct>(&mut conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };

        let mut product = Product::from(row);
        patch.apply(&mut product);

        let row = diesel::update(products::table.find(id))
            .set(&DbProduct::from(product))
            .get_result::<DbProduct>(&mut conn)
            .await?;

        Ok(Some(row.into()))
    }

    pub async fn delete_product(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(products::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }

    // Orders

    pub async fn list_orders(&self, params: &PageParams) -> StoreResult<Page<Order>> {
        let mut conn = self.pool.get().await?;
        let limit = params.limit();

        let rows = keyset_page!(orders, params)
            .load::<DbOrder>(&mut conn)
            .await?;
        Ok(Page::new(rows, limit, |o| PageCursor::new(o.created_at, &o.id)).filter_map(decode_order))
    }

    pub async fn update_order(&self, id: &str, patch: OrderPatch) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.get().await?;

        let Some(row) = orders::table
            .find(id)
            .first::<DbOrder>(&mut conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };

        let mut order = Order::try_from(row)?;
        patch.apply(&mut order);

        let row = diesel::update(orders::table.find(id))
            .set(&DbOrder::try_from(order)?)
            .get_result::<DbOrder>(&mut conn)
            .await?;

        info!("Order {} updated to status {}", row.id, row.status);
        Ok(Some(Order::try_from(row)?))
    }

    pub async fn delete_order(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(orders::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }

    // Artists

    pub async fn list_artists(&self) -> StoreResult<Vec<Artist>> {
        let mut conn = self.pool.get().await?;

        let rows = artists::table
            .order(artists::created_at.desc())
            .load::<DbArtist>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(Artist::from).collect())
    }

    pub async fn create_artist(&self, draft: NewArtist) -> StoreResult<Artist> {
        let mut conn = self.pool.get().await?;
        let artist = Artist {
            id: new_id(),
            name: draft.name,
            artist_name: draft.artist_name,
            tags: draft.tags,
            created_at: Utc::now(),
        };

        let row = diesel::insert_into(artists::table)
            .values(DbArtist::from(artist))
            .get_result::<DbArtist>(&mut conn)
            .await?;

        info!("Created artist {}", row.id);
        Ok(row.into())
    }

    pub async fn update_artist(&self, id: &str, patch: ArtistPatch) -> StoreResult<Option<Artist>> {
        let mut conn = self.pool.get().await?;

        let Some(row) = artists::table
            .find(id)
            .first::<DbArtist>(&mut conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };

        let mut artist = Artist::from(row);
        patch.apply(&mut artist);

        let row = diesel::update(artists::table.find(id))
            .set(&DbArtist::from(artist))
            .get_result::<DbArtist>(&mut conn)
            .await?;

        Ok(Some(row.into()))
    }

    pub async fn delete_artist(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(artists::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }

    // Subjects

    pub async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let mut conn = self.pool.get().await?;

        let rows = subjects::table
            .order(subjects::created_at.desc())
            .load::<DbSubject>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(Subject::from).collect())
    }

    pub async fn create_subject(&self, draft: NewSubject) -> StoreResult<Subject> {
        let mut conn = self.pool.get().await?;
        let subject = Subject {
            id: new_id(),
            category: draft.category,
            subjects: draft.subjects,
            created_at: Utc::now(),
        };

        let row = diesel::insert_into(subjects::table)
            .values(DbSubject::from(subject))
            .get_result::<DbSubject>(&mut conn)
            .await?;

        info!("Created subject category {}", row.category);
        Ok(row.into())
    }

    pub async fn update_subject(&self, id: &str, patch: SubjectPatch) -> StoreResult<Option<Subject>> {
        let mut conn = self.pool.get().await?;

        let Some(row) = subjects::table
            .find(id)
            .first::<DbSubject>(&mut conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };

        let mut subject = Subject::from(row);
        patch.apply(&mut subject);

        let row = diesel::update(subjects::table.find(id))
            .set(&DbSubject::from(subject))
            .get_result::<DbSubject>(&mut conn)
            .await?;

        Ok(Some(row.into()))
    }

    pub async fn delete_subject(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(subjects::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }

    // Home images

    pub async fn list_home_images(&self) -> StoreResult<Vec<HomeImage>> {
        let mut conn = self.pool.get().await?;

        let rows = home_images::table
            .order(home_images::created_at.desc())
            .load::<DbHomeImage>(&mut conn)
            .await?;

        Ok(rows.into_iter().map(HomeImage::from).collect())
    }

    pub async fn create_home_image(&self, draft: NewHomeImage) -> StoreResult<HomeImage> {
        let mut conn = self.pool.get().await?;
        let image = HomeImage {
            id: new_id(),
            title: draft.title,
            file_link: draft.file_link,
            aspect_ratio: draft.aspect_ratio,
            dimensions: draft.dimensions,
            tags: draft.tags,
            suggested_locations: draft.suggested_locations,
            created_at: Utc::now(),
        };

        let row = diesel::insert_into(home_images::table)
            .values(DbHomeImage::from(image))
            .get_result::<DbHomeImage>(&mut conn)
            .await?;

        info!("Created home image {}", row.id);
        Ok(row.into())
    }

    pub async fn update_home_image(&self, id: &str, patch: HomeImagePatch) -> StoreResult<Option<HomeImage>> {
        let mut conn = self.pool.get().await?;

        let Some(row) = home_images::table
            .find(id)
            .first::<DbHomeImage>(&mut conn)
            .await
            .optional()?
        else {
            return Ok(None);
        };

        let mut image = HomeImage::from(row);
        patch.apply(&mut image);

        let row = diesel::update(home_images::table.find(id))
            .set(&DbHomeImage::from(image))
            .get_result::<DbHomeImage>(&mut conn)
            .await?;

        Ok(Some(row.into()))
    }

    pub async fn delete_home_image(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(home_images::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }

    // Generated images

    pub async fn list_images(&self, params: &PageParams) -> StoreResult<Page<GeneratedImage>> {
        let mut conn = self.pool.get().await?;
        let limit = params.limit();

        let rows = keyset_page!(images, params)
            .load::<DbImage>(&mut conn)
            .await?;
        Ok(Page::new(rows, limit, |i| PageCursor::new(i.created_at, &i.id)).map(GeneratedImage::from))
    }

    pub async fn delete_image(&self, id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::delete(images::table.find(id)).execute(&mut conn).await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn params(limit: i64, cursor: Option<&PageCursor>) -> PageParams {
        PageParams {
            limit: Some(limit),
            before: cursor.map(|c| c.created_at),
            before_id: cursor.map(|c| c.id.clone()),
        }
    }

    /// In-memory rendition of the list queries: order by `(created_at, id)`
    /// descending, keep rows after the cursor, take `limit`.
    fn fetch(rows: &[(DateTime<Utc>, &str)], params: &PageParams) -> Page<String> {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|a, b| b.cmp(a));
        let data: Vec<_> = sorted
            .into_iter()
            .filter(|(created_at, id)| match (params.before, params.before_id.as_deref()) {
                (None, _) => true,
                (Some(before), None) => *created_at < before,
                (Some(before), Some(before_id)) => {
                    *created_at < before || (*created_at == before && *id < before_id)
                }
            })
            .take(params.limit() as usize)
            .collect();
        Page::new(data, params.limit(), |(t, id)| PageCursor::new(*t, id))
            .map(|(_, id)| id.to_string())
    }

    #[test]
    fn page_limit_is_clamped() {
        assert_eq!(PageParams::default().limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(params(500, None).limit(), MAX_PAGE_SIZE);
        assert_eq!(params(0, None).limit(), 1);
    }

    #[test]
    fn full_page_reports_more_with_last_row_cursor() {
        let now = Utc::now();
        let rows = vec![
            (now, "c"),
            (now - Duration::minutes(1), "b"),
            (now - Duration::minutes(2), "a"),
        ];

        let page = Page::new(rows, 3, |(t, id)| PageCursor::new(*t, id));

        assert!(page.has_more);
        assert_eq!(
            page.next_cursor,
            Some(PageCursor::new(now - Duration::minutes(2), "a"))
        );
    }

    #[test]
    fn short_page_is_the_last_one() {
        let now = Utc::now();

        let page = Page::new(vec![now], 20, |t| PageCursor::new(*t, "x"));
        assert!(!page.has_more);

        let empty: Page<DateTime<Utc>> = Page::new(vec![], 20, |t| PageCursor::new(*t, "x"));
        assert!(!empty.has_more);
        assert_eq!(empty.next_cursor, None);
    }

    #[test]
    fn rows_sharing_a_timestamp_are_not_skipped_across_pages() {
        let now = Utc::now();
        let earlier = now - Duration::minutes(1);
        let rows = vec![(now, "d"), (earlier, "a"), (earlier, "c"), (earlier, "b")];

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = fetch(&rows, &params(2, cursor.as_ref()));
            seen.extend(page.data);
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(seen, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn skipped_rows_keep_the_cursor_on_the_last_row_read() {
        let now = Utc::now();
        let rows = vec![(now, "b", true), (now, "a", false)];

        let page = Page::new(rows, 2, |(t, id, _)| PageCursor::new(*t, id))
            .filter_map(|(_, id, ok)| ok.then_some(id));

        assert_eq!(page.data, vec!["b"]);
        assert!(page.has_more);
        assert_eq!(page.next_cursor, Some(PageCursor::new(now, "a")));
    }

    #[test]
    fn undecodable_order_rows_are_skipped() {
        let row = |id: &str, products: serde_json::Value| DbOrder {
            id: id.to_string(),
            user_id: "u1".to_string(),
            total_amount: bigdecimal::BigDecimal::from(10),
            payment_status: "paid".to_string(),
            status: "pending".to_string(),
            products,
            shipping_address: serde_json::Value::Null,
            created_at: Utc::now(),
        };
        let good = row("o1", serde_json::json!([]));
        let bad = row("o2", serde_json::json!("not a list"));

        let orders: Vec<_> = vec![good, bad].into_iter().filter_map(decode_order).collect();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, "o1");
    }

    #[test]
    fn list_query_orders_and_filters_by_timestamp_then_id() {
        let cursor = PageCursor::new(Utc::now(), "b");
        let query = keyset_page!(users, &params(2, Some(&cursor)));
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();

        assert!(
            sql.contains(r#"ORDER BY "users"."created_at" DESC, "users"."id" DESC"#),
            "{}",
            sql
        );
        assert!(sql.contains(r#""users"."id" < $"#), "{}", sql);
    }
}

