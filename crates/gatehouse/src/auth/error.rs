//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No session token on the request.
    #[error("no session")]
    NoSession,

    /// Invalid token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Token expired.
    #[error("token expired")]
    TokenExpired,

    /// Email/password did not match. Carries no detail about which check failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// CSRF token missing or not matching the cookie.
    #[error("csrf token mismatch")]
    CsrfMismatch,

    /// The session cannot be authorized.
    #[error("forbidden")]
    Forbidden,

    /// Internal error.
    #[error("internal auth error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AuthError::NoSession => (StatusCode::UNAUTHORIZED, "no_session"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::CsrfMismatch => (StatusCode::FORBIDDEN, "csrf_mismatch"),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        // Internal details stay in the logs.
        let error = match &self {
            AuthError::Internal(detail) => {
                tracing::error!(error = %detail, "internal auth error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(AuthErrorResponse {
            error,
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}
