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
    /// Malformed callback request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Unknown, consumed, expired or forged state token.
    #[error("bad CSRF token")]
    Csrf,

    /// Identity provider could not be reached or refused the exchange.
    #[error("identity provider error: {0}")]
    Upstream(String),

    /// Provider did not vouch for the email address.
    #[error("identity provider returned an unverified email")]
    UnverifiedIdentity,

    /// Session credential could not be produced.
    #[error("failed to build session credential: {0}")]
    Credential(String),

    /// Handler expected an authenticated user but the gate did not run.
    #[error("user not authenticated")]
    Unauthenticated,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl AuthError {
    /// HTTP status and machine-readable code for this error.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AuthError::Csrf => (StatusCode::UNAUTHORIZED, "bad_csrf_token"),
            AuthError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AuthError::UnverifiedIdentity => (StatusCode::UNAUTHORIZED, "unverified_identity"),
            AuthError::Credential(_) => (StatusCode::INTERNAL_SERVER_ERROR, "credential_error"),
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status();

        let body = Json(AuthErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
        });

        (status, body).into_response()
    }
}
