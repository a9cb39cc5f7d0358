//! Documents managed through the admin screens.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tags::TagList;

/// An in-place edit of a stored document.
///
/// The same transform computes the row written to the store and the copy
/// returned to the caller, so a client replacing its local document with the
/// response holds exactly what was persisted.
pub trait Patch<T> {
    fn apply(self, target: &mut T);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: BigDecimal,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub image_url: Option<String>,
}

impl Patch<Product> for ProductPatch {
    fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(image_url) = self.image_url {
            product.image_url = image_url;
        }
    }
}

/// One entry of an order's `products` array, kept verbatim apart from the
/// two fields the backend reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(alias = "productId")]
    pub product_id: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedLineItem {
    #[serde(flatten)]
    pub item: LineItem,
    /// `None` when the product no longer exists or could not be read.
    pub product_details: Option<Product>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total_amount: BigDecimal,
    pub payment_status: String,
    pub status: String,
    pub products: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
}

/// Order header with each line item joined to its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAggregate {
    pub id: String,
    pub user_id: String,
    pub total_amount: BigDecimal,
    pub payment_status: String,
    pub status: String,
    pub products: Vec<EnrichedLineItem>,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
}

impl OrderAggregate {
    pub fn new(order: Order, products: Vec<EnrichedLineItem>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            payment_status: order.payment_status,
            status: order.status,
            products,
            shipping_address: order.shipping_address,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
}

impl Patch<Order> for OrderPatch {
    fn apply(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(address) = self.shipping_address {
            order.shipping_address = address;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub artist_name: String,
    pub tags: TagList,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewArtist {
    pub name: String,
    #[serde(default)]
    pub artist_name: String,
    #[serde(default)]
    pub tags: TagList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistPatch {
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub tags: Option<TagList>,
}

impl Patch<Artist> for ArtistPatch {
    fn apply(self, artist: &mut Artist) {
        if let Some(name) = self.name {
            artist.name = name;
        }
        if let Some(artist_name) = self.artist_name {
            artist.artist_name = artist_name;
        }
        if let Some(tags) = self.tags {
            artist.tags = tags;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub category: String,
    pub subjects: TagList,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubject {
    pub category: String,
    #[serde(default)]
    pub subjects: TagList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectPatch {
    pub category: Option<String>,
    pub subjects: Option<TagList>,
}

impl Patch<Subject> for SubjectPatch {
    fn apply(self, subject: &mut Subject) {
        if let Some(category) = self.category {
            subject.category = category;
        }
        if let Some(subjects) = self.subjects {
            subject.subjects = subjects;
        }
    }
}

pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeImage {
    pub id: String,
    pub title: String,
    pub file_link: String,
    pub aspect_ratio: String,
    pub dimensions: String,
    pub tags: TagList,
    pub suggested_locations: TagList,
    pub created_at: DateTime<Utc>,
}

fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHomeImage {
    pub title: String,
    pub file_link: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub dimensions: String,
    #[serde(default)]
    pub tags: TagList,
    #[serde(default)]
    pub suggested_locations: TagList,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeImagePatch {
    pub title: Option<String>,
    pub file_link: Option<String>,
    pub aspect_ratio: Option<String>,
    pub dimensions: Option<String>,
    pub tags: Option<TagList>,
    pub suggested_locations: Option<TagList>,
}

impl Patch<HomeImage> for HomeImagePatch {
    fn apply(self, image: &mut HomeImage) {
        if let Some(title) = self.title {
            image.title = title;
        }
        if let Some(file_link) = self.file_link {
            image.file_link = file_link;
        }
        if let Some(aspect_ratio) = self.aspect_ratio {
            image.aspect_ratio = aspect_ratio;
        }
        if let Some(dimensions) = self.dimensions {
            image.dimensions = dimensions;
        }
        if let Some(tags) = self.tags {
            image.tags = tags;
        }
        if let Some(locations) = self.suggested_locations {
            image.suggested_locations = locations;
        }
    }
}

/// An image produced by the generation pipeline for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: String,
    pub url: String,
    pub title: String,
    pub user_id: Option<String>,
    pub artist_id: Option<String>,
    pub subjects: TagList,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    fn artist() -> Artist {
        Artist {
            id: "ar1".to_string(),
            name: "Hokusai".to_string(),
            artist_name: "hokusai".to_string(),
            tags: TagList::parse("ukiyo-e, waves"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut target = artist();
        let patch: ArtistPatch = serde_json::from_value(json!({ "tags": "prints, japan" })).unwrap();

        patch.apply(&mut target);

        assert_eq!(target.name, "Hokusai");
        assert_eq!(target.tags.as_slice(), ["prints", "japan"]);
    }

    #[test]
    fn line_item_keeps_unknown_fields() {
        let item: LineItem = serde_json::from_value(json!({
            "product_id": "p1",
            "quantity": 2,
            "size": "A3"
        }))
        .unwrap();

        assert_eq!(item.product_id.as_deref(), Some("p1"));
        assert_eq!(item.extra.get("size"), Some(&json!("A3")));

        let enriched = EnrichedLineItem {
            item,
            product_details: None,
        };
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["size"], json!("A3"));
        assert_eq!(value["product_details"], json!(null));
    }

    #[test]
    fn order_patch_updates_status() {
        let mut order = Order {
            id: "o1".to_string(),
            user_id: "u1".to_string(),
            total_amount: BigDecimal::from_str("49.90").unwrap(),
            payment_status: "paid".to_string(),
            status: "pending".to_string(),
            products: vec![],
            shipping_address: ShippingAddress::default(),
            created_at: Utc::now(),
        };

        OrderPatch {
            status: Some("completed".to_string()),
            ..Default::default()
        }
        .apply(&mut order);

        assert_eq!(order.status, "completed");
        assert_eq!(order.payment_status, "paid");
    }

    #[test]
    fn new_home_image_defaults_aspect_ratio() {
        let draft: NewHomeImage =
            serde_json::from_value(json!({ "title": "Loft", "file_link": "https://cdn/x.jpg" })).unwrap();
        assert_eq!(draft.aspect_ratio, DEFAULT_ASPECT_RATIO);
        assert!(draft.tags.is_empty());
    }
}
