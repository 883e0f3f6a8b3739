//! Request payloads for the auth routes.

use serde::Deserialize;

/// Registration form. The `username` field carries the email address, same as
/// the field name the rendered form uses.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Query parameters a provider sends back to the callback route.
///
/// Everything is optional: a denied consent arrives as `error` with no code.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
