use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::{
    auth::{jwt::JwtKeys, repo::User, role::Capability},
    error::ApiError,
    state::AppState,
};

/// Pull the token out of a strict `Bearer <token>` Authorization value.
/// The scheme prefix is case sensitive; there is exactly one convention.
fn strip_bearer(header: &str) -> Option<&str> {
    header.strip_prefix("Bearer ")
}

/// Per-request authentication gate: verifies the bearer token and loads the
/// identity behind it (hash-free projection). Handlers taking `AuthUser`
/// never see an unauthenticated request.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated("No token, authorization denied"))?;

        let token =
            strip_bearer(header).ok_or(ApiError::Unauthenticated("Token is not valid"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthenticated("Token is not valid")
        })?;

        // A token can outlive its account; treat that the same as a bad token.
        let user = User::find_by_id(&state.db, claims.sub)
            .await
            .map_err(|e| ApiError::internal("Server error", e))?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token subject no longer exists");
                ApiError::Unauthenticated("Token is not valid")
            })?;

        Ok(AuthUser(user))
    }
}

/// Authorization gate for merchant-only routes. Runs the authentication step
/// itself, so it cannot observe a request without an identity, then applies
/// the capability predicate.
pub struct RequireMerchant(pub User);

#[async_trait]
impl FromRequestParts<AppState> for RequireMerchant {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.role.allows(Capability::ManageShops) {
            warn!(user_id = %user.id, role = ?user.role, "merchant route denied");
            return Err(ApiError::Forbidden);
        }
        Ok(RequireMerchant(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};

    #[test]
    fn strip_bearer_requires_the_exact_scheme() {
        assert_eq!(strip_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(strip_bearer("bearer abc"), None);
        assert_eq!(strip_bearer("Basic abc"), None);
        assert_eq!(strip_bearer("Bearer"), None);
        assert_eq!(strip_bearer(""), None);
    }

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/shops");
        if let Some(v) = value {
            builder = builder.header(AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(None);
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "No token, authorization denied");
    }

    #[tokio::test]
    async fn wrong_scheme_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Basic dXNlcjpwdw=="));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Token is not valid");
    }

    #[tokio::test]
    async fn garbage_token_is_unauthenticated() {
        let state = AppState::fake();
        let mut parts = parts_with_auth(Some("Bearer not.a.token"));
        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .expect("rejection");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Token is not valid");
    }
}
