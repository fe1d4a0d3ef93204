use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::shops::dto::{Category, CreateShopRequest, ListFilters, ShopImage, UpdateShopRequest};

/// Flat shops row. The nested wire shape is assembled in dto.rs.
#[derive(Debug, Clone, FromRow)]
pub struct ShopRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub category: Category,
    pub description: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub contact_email: Option<String>,
    pub images: Json<Vec<ShopImage>>,
    pub is_active: bool,
    pub rating_average: f64,
    pub rating_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct ShopWithOwnerRow {
    #[sqlx(flatten)]
    pub shop: ShopRow,
    pub owner_name: String,
    pub owner_email: String,
}

/// Active shops matching the filters, newest first. A NULL bind disables the
/// corresponding predicate; category compares as text so an unknown value
/// matches nothing instead of failing the enum cast.
pub async fn list(db: &PgPool, filters: &ListFilters) -> anyhow::Result<Vec<ShopWithOwnerRow>> {
    let rows = sqlx::query_as::<_, ShopWithOwnerRow>(
        r#"
        SELECT s.id, s.owner_id, s.name, s.category, s.description,
               s.street, s.city, s.state, s.pincode, s.latitude, s.longitude,
               s.phone, s.whatsapp, s.contact_email, s.images,
               s.is_active, s.rating_average, s.rating_count,
               s.created_at, s.updated_at,
               u.name AS owner_name, u.email AS owner_email
        FROM shops s
        JOIN users u ON u.id = s.owner_id
        WHERE s.is_active = TRUE
          AND ($1::text IS NULL
               OR to_tsvector('english', s.name || ' ' || coalesce(s.description, ''))
                  @@ websearch_to_tsquery('english', $1))
          AND ($2::text IS NULL OR s.category::text = $2)
          AND ($3::text IS NULL OR s.city ILIKE '%' || $3 || '%')
        ORDER BY s.created_at DESC
        LIMIT $4 OFFSET $5
    "#,
    )
    .bind(&filters.search)
    .bind(&filters.category)
    .bind(&filters.city)
    .bind(filters.limit)
    .bind(filters.offset())
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Total matching the same predicates as `list`, for the pagination envelope.
pub async fn count(db: &PgPool, filters: &ListFilters) -> anyhow::Result<i64> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM shops s
        WHERE s.is_active = TRUE
          AND ($1::text IS NULL
               OR to_tsvector('english', s.name || ' ' || coalesce(s.description, ''))
                  @@ websearch_to_tsquery('english', $1))
          AND ($2::text IS NULL OR s.category::text = $2)
          AND ($3::text IS NULL OR s.city ILIKE '%' || $3 || '%')
    "#,
    )
    .bind(&filters.search)
    .bind(&filters.category)
    .bind(&filters.city)
    .fetch_one(db)
    .await?;
    Ok(total)
}

pub async fn find_by_id(db: &PgPool, shop_id: Uuid) -> anyhow::Result<Option<ShopWithOwnerRow>> {
    let row = sqlx::query_as::<_, ShopWithOwnerRow>(
        r#"
        SELECT s.id, s.owner_id, s.name, s.category, s.description,
               s.street, s.city, s.state, s.pincode, s.latitude, s.longitude,
               s.phone, s.whatsapp, s.contact_email, s.images,
               s.is_active, s.rating_average, s.rating_count,
               s.created_at, s.updated_at,
               u.name AS owner_name, u.email AS owner_email
        FROM shops s
        JOIN users u ON u.id = s.owner_id
        WHERE s.id = $1
    "#,
    )
    .bind(shop_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn insert(
    db: &PgPool,
    owner_id: Uuid,
    req: &CreateShopRequest,
) -> anyhow::Result<ShopRow> {
    let address = req.address.clone().unwrap_or_default();
    let row = sqlx::query_as::<_, ShopRow>(
        r#"
        INSERT INTO shops (owner_id, name, category, description,
                           street, city, state, pincode, latitude, longitude,
                           phone, whatsapp, contact_email, images, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING id, owner_id, name, category, description,
                  street, city, state, pincode, latitude, longitude,
                  phone, whatsapp, contact_email, images,
                  is_active, rating_average, rating_count, created_at, updated_at
    "#,
    )
    .bind(owner_id)
    .bind(&req.name)
    .bind(req.category)
    .bind(&req.description)
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.pincode)
    .bind(address.coordinates.map(|c| c.latitude))
    .bind(address.coordinates.map(|c| c.longitude))
    .bind(&req.contact.phone)
    .bind(&req.contact.whatsapp)
    .bind(&req.contact.email)
    .bind(Json(&req.images))
    .bind(req.is_active)
    .fetch_one(db)
    .await?;
    Ok(row)
}

/// Apply a partial update, but only if the shop belongs to `owner_id`.
/// Missing-vs-foreign is indistinguishable on purpose: the row predicate
/// covers both, so nothing about foreign shops leaks. Address and contact
/// replace their whole group when present; other absent fields keep their
/// stored value.
pub async fn update_owned(
    db: &PgPool,
    shop_id: Uuid,
    owner_id: Uuid,
    patch: &UpdateShopRequest,
) -> anyhow::Result<Option<ShopRow>> {
    let address = patch.address.clone().unwrap_or_default();
    let row = sqlx::query_as::<_, ShopRow>(
        r#"
        UPDATE shops SET
            name = COALESCE($3, name),
            category = COALESCE($4, category),
            description = COALESCE($5, description),
            street = CASE WHEN $6 THEN $7 ELSE street END,
            city = CASE WHEN $6 THEN $8 ELSE city END,
            state = CASE WHEN $6 THEN $9 ELSE state END,
            pincode = CASE WHEN $6 THEN $10 ELSE pincode END,
            latitude = CASE WHEN $6 THEN $11 ELSE latitude END,
            longitude = CASE WHEN $6 THEN $12 ELSE longitude END,
            phone = CASE WHEN $13 THEN $14 ELSE phone END,
            whatsapp = CASE WHEN $13 THEN $15 ELSE whatsapp END,
            contact_email = CASE WHEN $13 THEN $16 ELSE contact_email END,
            images = COALESCE($17, images),
            is_active = COALESCE($18, is_active),
            updated_at = now()
        WHERE id = $1 AND owner_id = $2
        RETURNING id, owner_id, name, category, description,
                  street, city, state, pincode, latitude, longitude,
                  phone, whatsapp, contact_email, images,
                  is_active, rating_average, rating_count, created_at, updated_at
    "#,
    )
    .bind(shop_id)
    .bind(owner_id)
    .bind(&patch.name)
    .bind(patch.category)
    .bind(&patch.description)
    .bind(patch.address.is_some())
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.pincode)
    .bind(address.coordinates.map(|c| c.latitude))
    .bind(address.coordinates.map(|c| c.longitude))
    .bind(patch.contact.is_some())
    .bind(patch.contact.as_ref().map(|c| c.phone.clone()))
    .bind(patch.contact.as_ref().and_then(|c| c.whatsapp.clone()))
    .bind(patch.contact.as_ref().and_then(|c| c.email.clone()))
    .bind(patch.images.as_ref().map(Json))
    .bind(patch.is_active)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Same single-statement ownership scoping as `update_owned`.
pub async fn delete_owned(db: &PgPool, shop_id: Uuid, owner_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM shops WHERE id = $1 AND owner_id = $2")
        .bind(shop_id)
        .bind(owner_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Every shop of one merchant, active or not, newest first. Unpaginated.
pub async fn list_by_owner(db: &PgPool, owner_id: Uuid) -> anyhow::Result<Vec<ShopWithOwnerRow>> {
    let rows = sqlx::query_as::<_, ShopWithOwnerRow>(
        r#"
        SELECT s.id, s.owner_id, s.name, s.category, s.description,
               s.street, s.city, s.state, s.pincode, s.latitude, s.longitude,
               s.phone, s.whatsapp, s.contact_email, s.images,
               s.is_active, s.rating_average, s.rating_count,
               s.created_at, s.updated_at,
               u.name AS owner_name, u.email AS owner_email
        FROM shops s
        JOIN users u ON u.id = s.owner_id
        WHERE s.owner_id = $1
        ORDER BY s.created_at DESC
    "#,
    )
    .bind(owner_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
