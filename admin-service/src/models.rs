use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::*;
use std::collections::BTreeMap;

use crate::error::StoreError;

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
pub struct DbProduct {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: bigdecimal::BigDecimal,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::orders)]
pub struct DbOrder {
    pub id: String,
    pub user_id: String,
    pub total_amount: bigdecimal::BigDecimal,
    pub payment_status: String,
    pub status: String,
    pub products: serde_json::Value,
    pub shipping_address: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::artists)]
pub struct DbArtist {
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::subjects)]
pub struct DbSubject {
    pub id: String,
    pub category: String,
    #[diesel(column_name = subject_names)]
    pub subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::home_images)]
pub struct DbHomeImage {
    pub id: String,
    pub title: String,
    pub file_link: String,
    pub aspect_ratio: String,
    pub dimensions: String,
    pub tags: Vec<String>,
    pub suggested_locations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::images)]
pub struct DbImage {
    pub id: String,
    pub url: String,
    pub title: String,
    pub user_id: Option<String>,
    pub artist_id: Option<String>,
    pub subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_requests)]
pub struct DbOrderRequest {
    pub id: String,
    pub order_id: String,
    pub processed: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_processing_queue)]
pub struct DbProcessingRecord {
    pub id: String,
    pub order_id: String,
    pub status: String,
    pub steps: serde_json::Value,
    pub queued_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<DbUser> for UserProfile {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            is_admin: user.is_admin,
            created_at: Some(user.created_at),
        }
    }
}

impl From<DbProduct> for Product {
    fn from(product: DbProduct) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            created_at: product.created_at,
        }
    }
}

impl From<Product> for DbProduct {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            image_url: product.image_url,
            created_at: product.created_at,
        }
    }
}

impl TryFrom<DbOrder> for Order {
    type Error = StoreError;

    fn try_from(db_order: DbOrder) -> Result<Self, Self::Error> {
        let malformed = |reason: serde_json::Error| StoreError::Malformed {
            collection: "orders",
            id: db_order.id.clone(),
            reason: reason.to_string(),
        };
        let products: Vec<LineItem> = match &db_order.products {
            serde_json::Value::Null => Vec::new(),
            value => serde_json::from_value(value.clone()).map_err(malformed)?,
        };
        let shipping_address: ShippingAddress = match &db_order.shipping_address {
            serde_json::Value::Null => ShippingAddress::default(),
            value => serde_json::from_value(value.clone()).map_err(malformed)?,
        };

        Ok(Self {
            id: db_order.id,
            user_id: db_order.user_id,
            total_amount: db_order.total_amount,
            payment_status: db_order.payment_status,
            status: db_order.status,
            products,
            shipping_address,
            created_at: db_order.created_at,
        })
    }
}

impl TryFrom<Order> for DbOrder {
    type Error = StoreError;

    fn try_from(order: Order) -> Result<Self, Self::Error> {
        let malformed = |reason: serde_json::Error| StoreError::Malformed {
            collection: "orders",
            id: order.id.clone(),
            reason: reason.to_string(),
        };
        let products = serde_json::to_value(&order.products).map_err(malformed)?;
        let shipping_address = serde_json::to_value(&order.shipping_address).map_err(malformed)?;

        Ok(Self {
            id: order.id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            payment_status: order.payment_status,
            status: order.status,
            products,
            shipping_address,
            created_at: order.created_at,
        })
    }
}

impl From<DbArtist> for Artist {
    fn from(artist: DbArtist) -> Self {
        Self {
            id: artist.id,
            name: artist.name,
            artist_name: artist.artist_name,
            tags: TagList::from(artist.tags),
            created_at: artist.created_at,
        }
    }
}

impl From<Artist> for DbArtist {
    fn from(artist: Artist) -> Self {
        Self {
            id: artist.id,
            name: artist.name,
            artist_name: artist.artist_name,
            tags: artist.tags.into_vec(),
            created_at: artist.created_at,
        }
    }
}

impl From<DbSubject> for Subject {
    fn from(subject: DbSubject) -> Self {
        Self {
            id: subject.id,
            category: subject.category,
            subjects: TagList::from(subject.subjects),
            created_at: subject.created_at,
        }
    }
}

impl From<Subject> for DbSubject {
    fn from(subject: Subject) -> Self {
        Self {
            id: subject.id,
            category: subject.category,
            subjects: subject.subjects.into_vec(),
            created_at: subject.created_at,
        }
    }
}

impl From<DbHomeImage> for HomeImage {
    fn from(image: DbHomeImage) -> Self {
        Self {
            id: image.id,
            title: image.title,
            file_link: image.file_link,
            aspect_ratio: image.aspect_ratio,
            dimensions: image.dimensions,
            tags: TagList::from(image.tags),
            suggested_locations: TagList::from(image.suggested_locations),
            created_at: image.created_at,
        }
    }
}

impl From<HomeImage> for DbHomeImage {
    fn from(image: HomeImage) -> Self {
        Self {
            id: image.id,
            title: image.title,
            file_link: image.file_link,
            aspect_ratio: image.aspect_ratio,
            dimensions: image.dimensions,
            tags: image.tags.into_vec(),
            suggested_locations: image.suggested_locations.into_vec(),
            created_at: image.created_at,
        }
    }
}

impl From<DbImage> for GeneratedImage {
    fn from(image: DbImage) -> Self {
        Self {
            id: image.id,
            url: image.url,
            title: image.title,
            user_id: image.user_id,
            artist_id: image.artist_id,
            subjects: TagList::from(image.subjects),
            created_at: image.created_at,
        }
    }
}

impl From<DbOrderRequest> for SubmissionRecord {
    fn from(request: DbOrderRequest) -> Self {
        Self {
            id: request.id,
            order_id: request.order_id,
            processed: request.processed,
            created_at: request.created_at,
            processed_at: request.processed_at,
        }
    }
}

impl From<DbProcessingRecord> for ProcessingStatusRecord {
    fn from(record: DbProcessingRecord) -> Self {
        let steps = parse_steps(&record.id, record.steps);
        Self {
            id: record.id,
            order_id: record.order_id,
            status: record.status,
            steps,
            queued_at: record.queued_at,
            completed_at: record.completed_at,
        }
    }
}

/// Step entries that do not match the expected shape are dropped, which
/// makes them read as `"unknown"`.
fn parse_steps(record_id: &str, steps: serde_json::Value) -> BTreeMap<String, StepState> {
    let serde_json::Value::Object(entries) = steps else {
        return BTreeMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(name, value)| match serde_json::from_value::<StepState>(value) {
            Ok(state) => Some((name, state)),
            Err(e) => {
                tracing::warn!("Ignoring malformed step {} in processing record {}: {}", name, record_id, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_steps_are_dropped_individually() {
        let record = DbProcessingRecord {
            id: "p1".to_string(),
            order_id: "A1".to_string(),
            status: "processing".to_string(),
            steps: json!({
                "topaz": { "status": "completed" },
                "lumaprint": "garbled"
            }),
            queued_at: None,
            completed_at: None,
        };

        let record = ProcessingStatusRecord::from(record);

        assert_eq!(record.step_status("topaz"), "completed");
        assert_eq!(record.step_status("lumaprint"), "unknown");
    }

    #[test]
    fn order_line_items_accept_legacy_keys() {
        let db_order = DbOrder {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            total_amount: bigdecimal::BigDecimal::from(40),
            payment_status: "paid".to_string(),
            status: "pending".to_string(),
            products: json!([{ "productId": "p1", "quantity": 2 }]),
            shipping_address: json!(null),
            created_at: Utc::now(),
        };

        let order = Order::try_from(db_order).unwrap();

        assert_eq!(order.products[0].product_id.as_deref(), Some("p1"));
        assert_eq!(order.products[0].quantity, 2);
        assert_eq!(order.shipping_address, ShippingAddress::default());
    }

    #[test]
    fn subject_list_reads_the_subjects_column() {
        use crate::schema::subjects;
        use diesel::prelude::*;

        let query = subjects::table.select(subjects::subject_names);
        let sql = diesel::debug_query::<diesel::pg::Pg, _>(&query).to_string();

        assert!(sql.contains(r#""subjects"."subjects""#), "{}", sql);
    }
}
