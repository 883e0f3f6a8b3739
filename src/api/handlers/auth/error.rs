//! Error taxonomy for authentication flows.
//!
//! Local failures (bad input, duplicate registration, wrong credential)
//! recover into a redirect with a user-facing message. Infrastructure
//! failures surface as a generic 500 with a structured body; detail only
//! reaches the server-side logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input, rejected before any credential work.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Registration hit a unique key that is already taken.
    #[error("an account with this identity already exists")]
    DuplicateUser,

    /// Bad credential or rejected identity. Deliberately carries no detail
    /// about which part was wrong.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Database or network fault while talking to a store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    /// The OAuth provider returned an invalid or denied response.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Generic failure response for unhandled infrastructure errors.
///
/// The body is intentionally uninformative; callers log the real error first.
pub(crate) fn internal_error() -> Response {
    let body = serde_json::json!({
        "error": "internal",
        "message": "Something went wrong, please try again later",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// Redirect back to a form with a user-facing message in the query string.
pub(crate) fn redirect_with_error(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{path}?error={}", urlencoding::encode(message)))
}
