use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, PublicUser, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserRow,
    },
    error::{is_unique_violation, ApiError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.normalize();

    // Duplicate wins over field validation when both apply, so a taken
    // email reads the same no matter how the rest of the body looks.
    let taken = UserRow::find_by_email(&state.db, &payload.email)
        .await
        .map_err(|e| ApiError::internal("Server error during registration", e))?
        .is_some();
    if taken {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::DuplicateEmail);
    }

    payload.validate()?;

    let hash = hash_password(&payload.password)
        .map_err(|e| ApiError::internal("Server error during registration", e))?;

    let user = match UserRow::create(
        &state.db,
        &payload.name,
        &payload.email,
        &hash,
        payload.role,
        payload.phone.as_deref(),
    )
    .await
    {
        Ok(u) => u,
        // Two registrations racing past the lookup land on the unique index.
        Err(e) if is_unique_violation(&e) => {
            warn!(email = %payload.email, "email already registered");
            return Err(ApiError::DuplicateEmail);
        }
        Err(e) => return Err(ApiError::internal("Server error during registration", e)),
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign(user.id)
        .map_err(|e| ApiError::internal("Server error during registration", e))?;

    info!(user_id = %user.id, email = %user.email, role = ?user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.normalize();

    // Unknown email and wrong password are indistinguishable to the caller.
    let user = UserRow::find_by_email(&state.db, &payload.email)
        .await
        .map_err(|e| ApiError::internal("Server error during login", e))?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login with unknown email");
            ApiError::InvalidCredentials
        })?;

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| ApiError::internal("Server error during login", e))?;
    if !ok {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign(user.id)
        .map_err(|e| ApiError::internal("Server error during login", e))?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser::from(&user),
    }))
}

/// The auth gate already loaded and checked the identity; this just reshapes
/// it for the client.
#[instrument(skip_all)]
pub async fn me(AuthUser(user): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: PublicUser::from(&user),
    })
}
