use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::store::StoreError;

/// Reset-token verification failures, surfaced as distinct variants so
/// callers handle expiry and tampering differently.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("bad token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

/// Everything the auth flows can fail with. Recovered at the handler
/// boundary and rendered as a notice; only `Internal` becomes a 5xx.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Username already exists")]
    AlreadyExists,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Username not found")]
    NotFound,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Authorization was denied by the provider")]
    OAuthDenied,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists => AuthError::AlreadyExists,
            StoreError::Backend(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::AlreadyExists => StatusCode::CONFLICT,
            AuthError::PasswordMismatch => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            // No form is safe to return to; a plain failure page instead.
            AuthError::Token(_) => {
                return (
                    StatusCode::UNAUTHORIZED,
                    "The reset link is invalid or expired.",
                )
                    .into_response()
            }
            AuthError::OAuthDenied => StatusCode::FORBIDDEN,
            AuthError::Internal(e) => {
                error!(error = %e, "internal error in auth flow");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response();
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
