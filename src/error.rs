use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Request-level failures, converted to `status + {"error": message}` at the
/// HTTP boundary. Handlers return `Result<_, ApiError>`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("User already exists with this email")]
    DuplicateEmail,

    /// Unknown email and wrong password collapse into this one variant so a
    /// caller cannot tell which accounts exist.
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("Access denied. Merchant role required.")]
    Forbidden,

    #[error("{0}")]
    NotFound(&'static str),

    /// Ownership-filtered miss: "no such shop" and "not your shop" share one
    /// shape so existence is not leaked.
    #[error("Shop not found or unauthorized")]
    NotFoundOrUnauthorized,

    #[error("{context}")]
    Internal {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn internal(context: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            context,
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateEmail | Self::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::NotFoundOrUnauthorized => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal { context, source } = &self {
            tracing::error!(error = ?source, context, "request failed");
        }
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// True when the error chain bottoms out in a Postgres unique violation
/// (SQLSTATE 23505), e.g. two registrations racing on the same email.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::DuplicateEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidCredentials.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthenticated("Token is not valid").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::NotFound("Shop not found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::NotFoundOrUnauthorized.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::internal("Server error", anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_owned_and_missing_share_one_shape() {
        // Handlers map a nonexistent id and someone else's shop to this same
        // variant; the wire shape must stay a single pinned 404.
        let err = ApiError::NotFoundOrUnauthorized;
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Shop not found or unauthorized");
    }

    #[test]
    fn duplicate_email_keeps_the_exact_wire_message() {
        let err = ApiError::DuplicateEmail;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "User already exists with this email");
    }

    #[test]
    fn invalid_credentials_does_not_name_the_field() {
        let msg = ApiError::InvalidCredentials.to_string();
        assert_eq!(msg, "Invalid email or password");
        assert!(!msg.contains("not found"));
        assert!(!msg.contains("wrong"));
    }

    #[test]
    fn internal_hides_source_from_message() {
        let err = ApiError::internal(
            "Server error during registration",
            anyhow::anyhow!("pool timed out"),
        );
        assert_eq!(err.to_string(), "Server error during registration");
        assert!(!err.to_string().contains("pool"));
    }
}
