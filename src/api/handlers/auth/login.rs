//! Login endpoint.

use super::error::{AuthError, internal_error, redirect_with_error};
use super::session::establish_session;
use super::state::AuthState;
use super::types::LoginForm;
use super::utils::{normalize_email, valid_email};
use axum::{
    extract::{Extension, Form},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::error;

const BAD_CREDENTIALS: &str = "Invalid email or password";

/// POST `/login`: verify a local credential and open a session.
///
/// Every rejection lands on the same message; the response never says
/// whether the account exists.
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Form<LoginForm>>,
) -> Response {
    let Some(Form(form)) = payload else {
        return redirect_with_error("/login", BAD_CREDENTIALS).into_response();
    };

    match verify_login(&state, &form).await {
        Ok(headers) => (headers, Redirect::to("/secrets")).into_response(),
        Err(AuthError::AuthenticationFailure | AuthError::Validation(_)) => {
            redirect_with_error("/login", BAD_CREDENTIALS).into_response()
        }
        Err(err) => {
            error!("Login failed: {err}");
            internal_error()
        }
    }
}

async fn verify_login(state: &AuthState, form: &LoginForm) -> Result<HeaderMap, AuthError> {
    let email = normalize_email(&form.username);
    if !valid_email(&email) || form.password.is_empty() {
        return Err(AuthError::Validation("malformed credentials".to_string()));
    }

    let Some(user) = state.users().find_by_email(&email).await? else {
        return Err(AuthError::AuthenticationFailure);
    };
    // Provider-linked accounts may have no local credential at all.
    let Some(stored) = user.credential.as_deref() else {
        return Err(AuthError::AuthenticationFailure);
    };
    if !state.strategy().verify(stored, &form.password) {
        return Err(AuthError::AuthenticationFailure);
    }

    establish_session(state, user.id).await
}
