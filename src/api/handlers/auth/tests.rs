//! Auth module tests, driven against the in-process stores.

use super::memory::{MemorySessionStore, MemoryUserStore};
use super::oauth::{OAuthProvider, OAuthProviders, Provider};
use super::session::{authenticate_session, logout};
use super::state::{AuthConfig, AuthState};
use super::strategy::{CredentialStrategy, HashedStrategy, PlaintextStrategy};
use super::types::{CallbackQuery, LoginForm, RegisterForm};
use super::{login, oauth_callback, oauth_start, register};
use axum::{
    extract::{Extension, Form, Path, Query},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;

fn auth_state_with(strategy: Arc<dyn CredentialStrategy>) -> Arc<AuthState> {
    let config =
        AuthConfig::new("http://localhost:8080".to_string()).with_session_ttl_seconds(3600);
    Arc::new(AuthState::new(
        config,
        strategy,
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemorySessionStore::new()),
        OAuthProviders::new(Duration::from_secs(60)),
    ))
}

fn auth_state() -> Arc<AuthState> {
    // Plaintext keeps these tests fast; strategy laws are covered in
    // strategy.rs.
    auth_state_with(Arc::new(PlaintextStrategy))
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Turn a login/register response into request headers carrying its cookie.
fn cookie_headers(response: &Response) -> HeaderMap {
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("response sets a session cookie");
    let pair = set_cookie.split(';').next().expect("cookie pair");
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(pair).expect("cookie value"));
    headers
}

async fn do_register(state: &Arc<AuthState>, username: &str, password: &str) -> Response {
    register(
        Extension(state.clone()),
        Some(Form(RegisterForm {
            username: username.to_string(),
            password: password.to_string(),
        })),
    )
    .await
}

async fn do_login(state: &Arc<AuthState>, username: &str, password: &str) -> Response {
    login(
        Extension(state.clone()),
        Some(Form(LoginForm {
            username: username.to_string(),
            password: password.to_string(),
        })),
    )
    .await
}

#[tokio::test]
async fn register_then_login_round_trip() {
    let state = auth_state();

    let response = do_register(&state, "a@b.com", "pw").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/secrets");
    assert!(response.headers().contains_key(SET_COOKIE));

    let response = do_login(&state, "a@b.com", "pw").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/secrets");
}

#[tokio::test]
async fn register_then_login_round_trip_hashed() {
    let state = auth_state_with(Arc::new(HashedStrategy::new()));

    let response = do_register(&state, "a@b.com", "pw").await;
    assert_eq!(location(&response), "/secrets");

    let response = do_login(&state, "a@b.com", "pw").await;
    assert_eq!(location(&response), "/secrets");

    let response = do_login(&state, "a@b.com", "wrong").await;
    assert!(location(&response).starts_with("/login?error="));
}

#[tokio::test]
async fn login_with_wrong_password_stays_anonymous() {
    let state = auth_state();
    do_register(&state, "a@b.com", "pw").await;

    let response = do_login(&state, "a@b.com", "wrong").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/login?error="));
    assert!(!response.headers().contains_key(SET_COOKIE));
}

#[tokio::test]
async fn login_failure_does_not_reveal_which_part_was_wrong() {
    let state = auth_state();
    do_register(&state, "a@b.com", "pw").await;

    let wrong_password = do_login(&state, "a@b.com", "wrong").await;
    let unknown_user = do_login(&state, "nobody@b.com", "pw").await;
    assert_eq!(location(&wrong_password), location(&unknown_user));
}

#[tokio::test]
async fn duplicate_registration_redirects_with_conflict() {
    let state = auth_state();

    do_register(&state, "a@b.com", "first").await;
    let response = do_register(&state, "a@b.com", "second").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/register?error="));

    // The original credential still wins.
    let response = do_login(&state, "a@b.com", "first").await;
    assert_eq!(location(&response), "/secrets");
    let response = do_login(&state, "a@b.com", "second").await;
    assert!(location(&response).starts_with("/login?error="));
}

#[tokio::test]
async fn registration_validates_input() {
    let state = auth_state();

    let response = do_register(&state, "not-an-email", "pw").await;
    assert!(location(&response).starts_with("/register?error="));

    let response = do_register(&state, "a@b.com", "").await;
    assert!(location(&response).starts_with("/register?error="));

    let response = register(Extension(state.clone()), None).await;
    assert!(location(&response).starts_with("/register?error="));
}

#[tokio::test]
async fn email_is_normalized_before_lookup() {
    let state = auth_state();
    do_register(&state, " A@B.com ", "pw").await;

    let response = do_login(&state, "a@b.com", "pw").await;
    assert_eq!(location(&response), "/secrets");
}

#[tokio::test]
async fn session_cookie_resolves_to_the_registered_user() {
    let state = auth_state();
    let response = do_register(&state, "a@b.com", "pw").await;
    let headers = cookie_headers(&response);

    let user = authenticate_session(&headers, &state)
        .await
        .expect("session lookup")
        .expect("authenticated");
    assert_eq!(user.email.as_deref(), Some("a@b.com"));
}

#[tokio::test]
async fn garbage_session_cookie_is_anonymous() {
    let state = auth_state();
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_static("segreti_session=forged"));

    let user = authenticate_session(&headers, &state)
        .await
        .expect("session lookup");
    assert!(user.is_none());
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let state = auth_state();
    let response = do_register(&state, "a@b.com", "pw").await;
    let headers = cookie_headers(&response);

    let response = logout(headers.clone(), Extension(state.clone())).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("clearing cookie");
    assert!(cleared.contains("Max-Age=0"));

    // The old cookie no longer resolves.
    let user = authenticate_session(&headers, &state)
        .await
        .expect("session lookup");
    assert!(user.is_none());
}

#[tokio::test]
async fn logout_without_a_session_is_harmless() {
    let state = auth_state();
    let response = logout(HeaderMap::new(), Extension(state.clone())).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn oauth_start_redirects_to_consent_endpoint() {
    let provider = OAuthProvider::new(
        Provider::Google,
        "client-id".to_string(),
        "client-secret".to_string(),
        "http://localhost:8080/auth/google/callback".to_string(),
    )
    .expect("provider");
    let config = AuthConfig::new("http://localhost:8080".to_string());
    let state = Arc::new(AuthState::new(
        config,
        Arc::new(PlaintextStrategy),
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemorySessionStore::new()),
        OAuthProviders::new(Duration::from_secs(60)).with_provider(provider),
    ));

    let response = oauth_start(Path("google".to_string()), Extension(state)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
}

#[tokio::test]
async fn oauth_start_for_unconfigured_provider_falls_back_to_login() {
    let state = auth_state();
    let response = oauth_start(Path("google".to_string()), Extension(state)).await;
    assert!(location(&response).starts_with("/login?error="));
}

#[tokio::test]
async fn oauth_start_for_unknown_provider_falls_back_to_login() {
    let state = auth_state();
    let response = oauth_start(Path("github".to_string()), Extension(state)).await;
    assert!(location(&response).starts_with("/login?error="));
}

#[tokio::test]
async fn oauth_callback_with_denial_redirects_to_login() {
    let state = auth_state();
    let query = CallbackQuery {
        code: None,
        state: None,
        error: Some("access_denied".to_string()),
    };
    let response = oauth_callback(Path("google".to_string()), Query(query), Extension(state)).await;
    assert!(location(&response).starts_with("/login?error="));
}

#[tokio::test]
async fn oauth_callback_with_unknown_state_redirects_to_login() {
    let provider = OAuthProvider::new(
        Provider::Google,
        "client-id".to_string(),
        "client-secret".to_string(),
        "http://localhost:8080/auth/google/callback".to_string(),
    )
    .expect("provider");
    let config = AuthConfig::new("http://localhost:8080".to_string());
    let state = Arc::new(AuthState::new(
        config,
        Arc::new(PlaintextStrategy),
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemorySessionStore::new()),
        OAuthProviders::new(Duration::from_secs(60)).with_provider(provider),
    ));

    let query = CallbackQuery {
        code: Some("code".to_string()),
        state: Some("never-issued".to_string()),
        error: None,
    };
    let response = oauth_callback(Path("google".to_string()), Query(query), Extension(state)).await;
    assert!(location(&response).starts_with("/login?error="));
}
