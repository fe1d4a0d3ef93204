use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::User;
use crate::error::ApiError;
use crate::shops::repo::{ShopRow, ShopWithOwnerRow};

/// Shown for shops that have not uploaded any image yet.
pub const PLACEHOLDER_IMAGE_URL: &str = "/images/shop-placeholder.png";

pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Closed set of shop categories, stored as the Postgres `shop_category`
/// enum. The query-string sentinel `all` is not a category; it is handled in
/// filter normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "shop_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Restaurant,
    Grocery,
    Electronics,
    Clothing,
    Pharmacy,
    Services,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub phone: String,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: i32,
}

/// The owner fields embedded in shop responses. Never the phone, never the
/// hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for OwnerSummary {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
        }
    }
}

/// A shop as it appears on the wire: camelCase keys, nested address/contact/
/// rating groups, owner summary embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub description: Option<String>,
    pub address: Address,
    pub contact: Contact,
    pub images: Vec<ShopImage>,
    pub is_active: bool,
    pub rating: Rating,
    pub owner: OwnerSummary,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Shop {
    /// Assemble the wire shape from a flat row plus the owner summary the
    /// caller already holds (insert/update paths, where the owner is the
    /// authenticated user).
    pub fn from_parts(row: ShopRow, owner: OwnerSummary) -> Self {
        let coordinates = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            address: Address {
                street: row.street,
                city: row.city,
                state: row.state,
                pincode: row.pincode,
                coordinates,
            },
            contact: Contact {
                phone: row.phone,
                whatsapp: row.whatsapp,
                email: row.contact_email,
            },
            images: row.images.0,
            is_active: row.is_active,
            rating: Rating {
                average: row.rating_average,
                count: row.rating_count,
            },
            owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// First image, or the placeholder when none were provided.
    pub fn primary_image_url(&self) -> &str {
        self.images
            .first()
            .map(|img| img.url.as_str())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
    }
}

impl From<ShopWithOwnerRow> for Shop {
    fn from(row: ShopWithOwnerRow) -> Self {
        let owner = OwnerSummary {
            id: row.shop.owner_id,
            name: row.owner_name,
            email: row.owner_email,
        };
        Shop::from_parts(row.shop, owner)
    }
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    10
}

/// Query string for the public listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl Default for ShopFilters {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            city: None,
            page: default_page(),
            limit: default_limit(),
        }
    }
}

/// Listing filters after normalization: blank strings and the `all` category
/// sentinel collapse to "no filter", page and limit are floored at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilters {
    pub search: Option<String>,
    pub category: Option<String>,
    pub city: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl ListFilters {
    pub fn offset(&self) -> i64 {
        // page and limit come off the query string unbounded; saturate so an
        // absurd page reads as an empty page, not a negative OFFSET.
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl ShopFilters {
    pub fn normalized(&self) -> ListFilters {
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        ListFilters {
            search: non_blank(&self.search),
            category: non_blank(&self.category).filter(|c| c != "all"),
            city: non_blank(&self.city),
            page: self.page.max(1),
            limit: self.limit.max(1),
        }
    }
}

/// Pages = ceil(total / limit); zero items means zero pages. Saturates
/// instead of overflowing when the caller passes a huge limit.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    total.saturating_add(limit - 1) / limit
}

/// Body for `POST /shops`. Rating is intentionally absent: it starts at the
/// default and belongs to a review flow that does not exist here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShopRequest {
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    pub contact: Contact,
    #[serde(default)]
    pub images: Vec<ShopImage>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl CreateShopRequest {
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation("Shop name is required".into()));
        }
        if self.contact.phone.trim().is_empty() {
            return Err(ApiError::Validation("Contact phone is required".into()));
        }
        validate_description(self.description.as_deref())
    }
}

/// Body for `PUT /shops/:id`. Absent fields are left untouched; address,
/// contact and images replace their whole group when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShopRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ShopImage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UpdateShopRequest {
    pub fn normalize(&mut self) {
        if let Some(name) = &mut self.name {
            *name = name.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.as_deref() == Some("") {
            return Err(ApiError::Validation("Shop name is required".into()));
        }
        if let Some(contact) = &self.contact {
            if contact.phone.trim().is_empty() {
                return Err(ApiError::Validation("Contact phone is required".into()));
            }
        }
        validate_description(self.description.as_deref())
    }
}

pub fn validate_description(description: Option<&str>) -> Result<(), ApiError> {
    if let Some(d) = description {
        if d.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(ApiError::Validation(format!(
                "Description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }
    Ok(())
}

/// Response for the public listing.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopPage {
    pub shops: Vec<Shop>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShopResponse {
    pub shop: Shop,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShopsResponse {
    pub shops: Vec<Shop>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn sample_row() -> ShopRow {
        ShopRow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Corner Grocery".into(),
            category: Category::Grocery,
            description: Some("Fresh produce daily".into()),
            street: Some("12 Market Rd".into()),
            city: Some("Pune".into()),
            state: Some("MH".into()),
            pincode: Some("411001".into()),
            latitude: Some(18.52),
            longitude: Some(73.86),
            phone: "555-0100".into(),
            whatsapp: None,
            contact_email: None,
            images: Json(vec![]),
            is_active: true,
            rating_average: 0.0,
            rating_count: 0,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn sample_owner() -> OwnerSummary {
        OwnerSummary {
            id: Uuid::new_v4(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
        }
    }

    #[test]
    fn shop_serializes_camel_case_with_nested_groups() {
        let shop = Shop::from_parts(sample_row(), sample_owner());
        let json = serde_json::to_value(&shop).unwrap();
        assert!(json.get("isActive").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert_eq!(json["category"], "grocery");
        assert_eq!(json["address"]["city"], "Pune");
        assert_eq!(json["address"]["coordinates"]["latitude"], 18.52);
        assert_eq!(json["contact"]["phone"], "555-0100");
        assert_eq!(json["rating"]["count"], 0);
        assert_eq!(json["owner"]["email"], "asha@example.com");
        assert!(json.get("is_active").is_none());
    }

    #[test]
    fn missing_coordinate_halves_drop_the_pair() {
        let mut row = sample_row();
        row.longitude = None;
        let shop = Shop::from_parts(row, sample_owner());
        assert!(shop.address.coordinates.is_none());
    }

    #[test]
    fn placeholder_when_no_images() {
        let shop = Shop::from_parts(sample_row(), sample_owner());
        assert_eq!(shop.primary_image_url(), PLACEHOLDER_IMAGE_URL);

        let mut row = sample_row();
        row.images = Json(vec![ShopImage {
            url: "https://cdn.example.com/front.jpg".into(),
            alt: Some("storefront".into()),
        }]);
        let shop = Shop::from_parts(row, sample_owner());
        assert_eq!(shop.primary_image_url(), "https://cdn.example.com/front.jpg");
    }

    #[test]
    fn category_all_sentinel_means_no_filter() {
        let filters = ShopFilters {
            category: Some("all".into()),
            ..Default::default()
        };
        assert_eq!(filters.normalized().category, None);

        let filters = ShopFilters {
            category: Some("grocery".into()),
            ..Default::default()
        };
        assert_eq!(filters.normalized().category.as_deref(), Some("grocery"));
    }

    #[test]
    fn blank_filters_collapse_to_none() {
        let filters = ShopFilters {
            search: Some("   ".into()),
            category: Some("".into()),
            city: Some("  Pune ".into()),
            ..Default::default()
        };
        let n = filters.normalized();
        assert_eq!(n.search, None);
        assert_eq!(n.category, None);
        assert_eq!(n.city.as_deref(), Some("Pune"));
    }

    #[test]
    fn page_and_limit_are_floored() {
        let filters = ShopFilters {
            page: 0,
            limit: -5,
            ..Default::default()
        };
        let n = filters.normalized();
        assert_eq!(n.page, 1);
        assert_eq!(n.limit, 1);
        assert_eq!(n.offset(), 0);
    }

    #[test]
    fn pagination_arithmetic() {
        assert_eq!(total_pages(15, 10), 2);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);

        let page2 = ListFilters {
            search: None,
            category: None,
            city: None,
            page: 2,
            limit: 10,
        };
        assert_eq!(page2.offset(), 10);
    }

    #[test]
    fn huge_page_and_limit_saturate_instead_of_overflowing() {
        // Query integers are attacker-controlled; the arithmetic must not
        // wrap into a negative OFFSET or panic on the listing path.
        let filters = ShopFilters {
            page: i64::MAX,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(filters.normalized().offset(), i64::MAX);

        let both_huge = ShopFilters {
            page: i64::MAX,
            limit: i64::MAX,
            ..Default::default()
        };
        assert_eq!(both_huge.normalized().offset(), i64::MAX);

        assert_eq!(total_pages(5, i64::MAX), 1);
        assert_eq!(total_pages(0, i64::MAX), 0);
        assert_eq!(total_pages(i64::MAX, 1), i64::MAX);
    }

    #[test]
    fn description_bound_is_enforced() {
        assert!(validate_description(None).is_ok());
        assert!(validate_description(Some("short")).is_ok());
        let long = "x".repeat(MAX_DESCRIPTION_LEN + 1);
        assert!(validate_description(Some(&long)).is_err());
        let exact = "x".repeat(MAX_DESCRIPTION_LEN);
        assert!(validate_description(Some(&exact)).is_ok());
    }

    #[test]
    fn page_envelope_uses_camel_case_counters() {
        let page = ShopPage {
            shops: vec![],
            total: 15,
            total_pages: 2,
            current_page: 1,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["total"], 15);
    }

    #[test]
    fn create_request_requires_name_and_phone() {
        let mut req = CreateShopRequest {
            name: "  Corner Grocery  ".into(),
            category: Category::Grocery,
            description: None,
            address: None,
            contact: Contact {
                phone: "555-0100".into(),
                whatsapp: None,
                email: None,
            },
            images: vec![],
            is_active: true,
        };
        req.normalize();
        assert_eq!(req.name, "Corner Grocery");
        assert!(req.validate().is_ok());

        req.name = "   ".into();
        req.normalize();
        assert!(req.validate().is_err());

        req.name = "Corner Grocery".into();
        req.contact.phone = "  ".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn update_request_checks_only_present_fields() {
        let mut patch = UpdateShopRequest::default();
        assert!(patch.validate().is_ok());

        patch.name = Some("  ".into());
        patch.normalize();
        assert!(patch.validate().is_err());

        patch.name = Some("Renamed".into());
        patch.contact = Some(Contact {
            phone: "".into(),
            whatsapp: None,
            email: None,
        });
        assert!(patch.validate().is_err());
    }
}
