//! Registration endpoint.

use super::error::{AuthError, internal_error, redirect_with_error};
use super::session::establish_session;
use super::state::AuthState;
use super::types::RegisterForm;
use super::utils::{normalize_email, valid_email};
use axum::{
    extract::{Extension, Form},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// POST `/register`: create a local account and log it in immediately.
pub async fn register(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Form<RegisterForm>>,
) -> Response {
    let Some(Form(form)) = payload else {
        return redirect_with_error("/register", "Missing registration form").into_response();
    };

    match create_account(&state, &form).await {
        Ok(headers) => {
            info!("New account registered");
            (headers, Redirect::to("/secrets")).into_response()
        }
        Err(AuthError::Validation(message)) => {
            redirect_with_error("/register", &message).into_response()
        }
        Err(AuthError::DuplicateUser) => {
            warn!("Registration conflict");
            redirect_with_error("/register", "An account with this email already exists")
                .into_response()
        }
        Err(err) => {
            error!("Registration failed: {err}");
            internal_error()
        }
    }
}

/// Validate, protect, store, and auto-login. Input is rejected here, at the
/// boundary; nothing malformed reaches the credential strategy or the store.
async fn create_account(state: &AuthState, form: &RegisterForm) -> Result<HeaderMap, AuthError> {
    let email = normalize_email(&form.username);
    if !valid_email(&email) {
        return Err(AuthError::Validation(
            "Enter a valid email address".to_string(),
        ));
    }
    if form.password.is_empty() {
        return Err(AuthError::Validation("Enter a password".to_string()));
    }

    let credential = state.strategy().protect(&form.password)?;
    let user = state.users().create_local(&email, &credential).await?;

    // Fresh registrations are logged in right away.
    establish_session(state, user.id).await
}
