//! Server-rendered pages.
//!
//! Rendering is a handful of format strings, nothing more. The
//! interesting part is the gate on `/secrets`: the page renders only when the
//! session cookie resolves to a live user.

use crate::api::handlers::auth::{AuthState, oauth::Provider, session};
use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, HeaderValue, header::CACHE_CONTROL},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

/// GET `/`: landing page.
pub async fn home() -> Html<String> {
    page(
        "Segreti",
        r#"<h1>Segreti</h1>
<p>Everyone has secrets. Keep yours behind a login.</p>
<p><a href="/register">Register</a> or <a href="/login">Log in</a></p>"#,
    )
}

/// GET `/login`: login form, with an optional flash message.
pub async fn login_page(
    Extension(state): Extension<Arc<AuthState>>,
    Query(query): Query<MessageQuery>,
) -> Html<String> {
    let body = format!(
        r#"<h1>Log in</h1>
{flash}<form action="/login" method="post">
<label>Email <input type="email" name="username" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Log in</button>
</form>
{providers}<p><a href="/register">Need an account? Register</a></p>"#,
        flash = flash(query.error.as_deref()),
        providers = provider_links(&state),
    );
    page("Log in", &body)
}

/// GET `/register`: registration form, with an optional flash message.
pub async fn register_page(
    Extension(state): Extension<Arc<AuthState>>,
    Query(query): Query<MessageQuery>,
) -> Html<String> {
    let body = format!(
        r#"<h1>Register</h1>
{flash}<form action="/register" method="post">
<label>Email <input type="email" name="username" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Register</button>
</form>
{providers}<p><a href="/login">Already registered? Log in</a></p>"#,
        flash = flash(query.error.as_deref()),
        providers = provider_links(&state),
    );
    page("Register", &body)
}

/// GET `/secrets`: the protected page. Anonymous visitors are sent to login.
pub async fn secrets(headers: HeaderMap, Extension(state): Extension<Arc<AuthState>>) -> Response {
    match session::authenticate_session(&headers, &state).await {
        Ok(Some(user)) => {
            let who = user.email.as_deref().unwrap_or("you");
            let body = format!(
                r#"<h1>Secrets</h1>
<p>Welcome, {}. This page is only for authenticated eyes.</p>
<p>The secret: the best kept secrets are the ones never written down.</p>
<p><a href="/logout">Log out</a></p>"#,
                escape_html(who),
            );
            // Browsers must not replay this page from cache after logout.
            let mut response_headers = HeaderMap::new();
            response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            (response_headers, page("Secrets", &body)).into_response()
        }
        Ok(None) => Redirect::to("/login").into_response(),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            crate::api::handlers::auth::error::internal_error()
        }
    }
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
{body}
</body>
</html>"#
    ))
}

fn flash(message: Option<&str>) -> String {
    message.map_or_else(String::new, |message| {
        format!("<p class=\"error\">{}</p>\n", escape_html(message))
    })
}

/// Sign-in links for whichever providers are configured.
fn provider_links(state: &AuthState) -> String {
    let mut links = String::new();
    for provider in [Provider::Google, Provider::Facebook] {
        if state.oauth().is_configured(provider) {
            links.push_str(&format!(
                "<p><a href=\"/auth/{0}\">Sign in with {1}</a></p>\n",
                provider.as_str(),
                capitalize(provider.as_str()),
            ));
        }
    }
    links
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Flash messages come straight from the query string; escape them.
fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
