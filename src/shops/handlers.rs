use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::RequireMerchant,
    error::ApiError,
    shops::{
        dto::{
            total_pages, CreateShopRequest, DeleteResponse, OwnerSummary, Shop, ShopFilters,
            ShopPage, ShopResponse, ShopsResponse, UpdateShopRequest,
        },
        repo,
    },
    state::AppState,
};

pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/shops", get(list_shops).post(create_shop))
        // Both spellings are live; clients use either.
        .route("/shops/me/myshops", get(my_shops))
        .route("/shops/merchant/my-shops", get(my_shops))
        .route(
            "/shops/:id",
            get(get_shop).put(update_shop).delete(delete_shop),
        )
}

/// Public listing: active shops only, filtered and paginated.
#[instrument(skip(state))]
pub async fn list_shops(
    State(state): State<AppState>,
    Query(query): Query<ShopFilters>,
) -> Result<Json<ShopPage>, ApiError> {
    let filters = query.normalized();
    let rows = repo::list(&state.db, &filters)
        .await
        .map_err(|e| ApiError::internal("Server error while fetching shops", e))?;
    let total = repo::count(&state.db, &filters)
        .await
        .map_err(|e| ApiError::internal("Server error while fetching shops", e))?;

    Ok(Json(ShopPage {
        shops: rows.into_iter().map(Shop::from).collect(),
        total,
        total_pages: total_pages(total, filters.limit),
        current_page: filters.page,
    }))
}

/// Public detail view. Deliberately not filtered on is_active, so a merchant
/// can still open a shop they have hidden from the listing.
#[instrument(skip(state))]
pub async fn get_shop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShopResponse>, ApiError> {
    let row = repo::find_by_id(&state.db, id)
        .await
        .map_err(|e| ApiError::internal("Server error while fetching shop", e))?
        .ok_or(ApiError::NotFound("Shop not found"))?;
    Ok(Json(ShopResponse { shop: row.into() }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_shop(
    State(state): State<AppState>,
    RequireMerchant(user): RequireMerchant,
    Json(mut payload): Json<CreateShopRequest>,
) -> Result<(StatusCode, Json<ShopResponse>), ApiError> {
    payload.normalize();
    payload.validate()?;

    let row = repo::insert(&state.db, user.id, &payload)
        .await
        .map_err(|e| ApiError::internal("Server error while creating shop", e))?;

    info!(shop_id = %row.id, owner_id = %user.id, "shop created");
    Ok((
        StatusCode::CREATED,
        Json(ShopResponse {
            shop: Shop::from_parts(row, OwnerSummary::from(&user)),
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_shop(
    State(state): State<AppState>,
    RequireMerchant(user): RequireMerchant,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UpdateShopRequest>,
) -> Result<Json<ShopResponse>, ApiError> {
    payload.normalize();
    payload.validate()?;

    let row = repo::update_owned(&state.db, id, user.id, &payload)
        .await
        .map_err(|e| ApiError::internal("Server error while updating shop", e))?
        .ok_or(ApiError::NotFoundOrUnauthorized)?;

    info!(shop_id = %row.id, owner_id = %user.id, "shop updated");
    Ok(Json(ShopResponse {
        shop: Shop::from_parts(row, OwnerSummary::from(&user)),
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_shop(
    State(state): State<AppState>,
    RequireMerchant(user): RequireMerchant,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = repo::delete_owned(&state.db, id, user.id)
        .await
        .map_err(|e| ApiError::internal("Server error while deleting shop", e))?;
    if !deleted {
        return Err(ApiError::NotFoundOrUnauthorized);
    }

    info!(shop_id = %id, owner_id = %user.id, "shop deleted");
    Ok(Json(DeleteResponse {
        message: "Shop deleted successfully".into(),
    }))
}

/// Everything the merchant owns, hidden shops included.
#[instrument(skip(state, user))]
pub async fn my_shops(
    State(state): State<AppState>,
    RequireMerchant(user): RequireMerchant,
) -> Result<Json<ShopsResponse>, ApiError> {
    let rows = repo::list_by_owner(&state.db, user.id)
        .await
        .map_err(|e| ApiError::internal("Server error while fetching your shops", e))?;
    Ok(Json(ShopsResponse {
        shops: rows.into_iter().map(Shop::from).collect(),
    }))
}
