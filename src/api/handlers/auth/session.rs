//! Session cookie handling and logout.

use super::error::AuthError;
use super::state::{AuthConfig, AuthState};
use super::storage::UserRecord;
use super::utils::hash_session_token;
use anyhow::anyhow;
use axum::{
    extract::Extension,
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

pub(crate) const SESSION_COOKIE_NAME: &str = "segreti_session";

/// Resolve the session cookie into the authenticated user, if any.
///
/// Returns `Ok(None)` when the cookie is missing, the token is unknown or
/// expired, or the referenced user no longer exists. Anonymous, never fatal.
pub(crate) async fn authenticate_session(
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<Option<UserRecord>, AuthError> {
    let Some(token) = extract_session_token(headers) else {
        return Ok(None);
    };
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_session_token(&token);
    let Some(user_id) = state.sessions().lookup(&token_hash).await? else {
        return Ok(None);
    };
    // The session holds only the user id; the record store resolves the rest.
    state.users().find_by_id(user_id).await
}

/// Create a session for `user_id` and return the headers that set its cookie.
pub(super) async fn establish_session(
    state: &AuthState,
    user_id: Uuid,
) -> Result<HeaderMap, AuthError> {
    let token = state
        .sessions()
        .insert(user_id, state.config().session_ttl_seconds())
        .await?;

    let mut headers = HeaderMap::new();
    let cookie = session_cookie(state.config(), &token)
        .map_err(|err| AuthError::StoreUnavailable(anyhow!("invalid cookie value: {err}")))?;
    headers.insert(SET_COOKIE, cookie);
    Ok(headers)
}

/// GET `/logout`: drop the session and send the browser home.
pub async fn logout(headers: HeaderMap, Extension(state): Extension<Arc<AuthState>>) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_session_token(&token);
        if let Err(err) = state.sessions().delete(&token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, Redirect::to("/")).into_response()
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_session_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_config() -> AuthConfig {
        AuthConfig::new("http://localhost:8080".to_string()).with_session_ttl_seconds(3600)
    }

    #[test]
    fn session_cookie_is_http_only_and_scoped() {
        let cookie = session_cookie(&http_config(), "token-value").expect("cookie");
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.starts_with("segreti_session=token-value; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn session_cookie_secure_over_https() {
        let config = AuthConfig::new("https://segreti.dev".to_string());
        let cookie = session_cookie(&config, "token-value").expect("cookie");
        assert!(cookie.to_str().expect("ascii").ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&http_config()).expect("cookie");
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.starts_with("segreti_session=; "));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn extract_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; segreti_session=the-token; theme=dark"),
        );
        assert_eq!(
            extract_session_token(&headers).as_deref(),
            Some("the-token")
        );
    }

    #[test]
    fn extract_token_missing_cookie() {
        let headers = HeaderMap::new();
        assert!(extract_session_token(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=1; theme=dark"));
        assert!(extract_session_token(&headers).is_none());
    }
}
