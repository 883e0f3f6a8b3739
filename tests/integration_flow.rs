//! End-to-end flows through the full router against the in-process stores.

use axum::{
    Router,
    body::Body,
    http::{
        Request, Response, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use segreti::api;
use segreti::api::handlers::auth::{
    AuthConfig, AuthState,
    memory::{MemorySessionStore, MemoryUserStore},
    oauth::OAuthProviders,
    strategy::{CredentialStrategy, EncryptedStrategy, HashedStrategy, PlaintextStrategy},
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_with(strategy: Arc<dyn CredentialStrategy>) -> Router {
    let config =
        AuthConfig::new("http://localhost:8080".to_string()).with_session_ttl_seconds(3600);
    let state = Arc::new(AuthState::new(
        config,
        strategy,
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemorySessionStore::new()),
        OAuthProviders::new(Duration::from_secs(60)),
    ));
    api::app(state)
}

fn app() -> Router {
    app_with(Arc::new(PlaintextStrategy))
}

async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router response")
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(COOKIE, cookie)
        .body(Body::empty())
        .expect("request")
}

fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn session_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie")
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

#[tokio::test]
async fn register_login_logout_scenario() {
    let router = app();

    // Register and land on the protected page.
    let response = send(&router, form_post("/register", "username=a%40b.com&password=pw")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/secrets");
    let cookie = session_cookie(&response);

    // The protected page renders for the session and is never cached.
    let response = send(&router, get_with_cookie("/secrets", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok()),
        Some("no-store")
    );
    let body = body_text(response).await;
    assert!(body.contains("Secrets"));
    assert!(body.contains("a@b.com"));

    // Logout goes home and clears the cookie.
    let response = send(&router, get_with_cookie("/logout", &cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cleared = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("clearing cookie");
    assert!(cleared.contains("Max-Age=0"));

    // Replaying the old cookie no longer authenticates.
    let response = send(&router, get_with_cookie("/secrets", &cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn secrets_requires_a_session() {
    let router = app();

    let response = send(&router, get("/secrets")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn login_with_wrong_password_redirects_back() {
    let router = app();
    send(&router, form_post("/register", "username=a%40b.com&password=pw")).await;

    let response = send(&router, form_post("/login", "username=a%40b.com&password=nope")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/login?error="));
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn duplicate_registration_redirects_back() {
    let router = app();
    send(&router, form_post("/register", "username=a%40b.com&password=pw")).await;

    let response = send(&router, form_post("/register", "username=a%40b.com&password=pw")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/register?error="));
}

#[tokio::test]
async fn flows_hold_for_hashed_and_encrypted_strategies() {
    let strategies: Vec<Arc<dyn CredentialStrategy>> = vec![
        Arc::new(HashedStrategy::new()),
        Arc::new(EncryptedStrategy::new([3u8; 32])),
    ];

    for strategy in strategies {
        let router = app_with(strategy);

        let response =
            send(&router, form_post("/register", "username=a%40b.com&password=pw")).await;
        assert_eq!(location(&response), "/secrets");

        let response = send(&router, form_post("/login", "username=a%40b.com&password=pw")).await;
        assert_eq!(location(&response), "/secrets");

        let response =
            send(&router, form_post("/login", "username=a%40b.com&password=wrong")).await;
        assert!(location(&response).starts_with("/login?error="));
    }
}

#[tokio::test]
async fn public_pages_render() {
    let router = app();

    let response = send(&router, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Segreti"));

    let response = send(&router, get("/login")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&router, get("/register?error=taken")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("taken"));
}

#[tokio::test]
async fn flash_messages_are_escaped() {
    let router = app();

    let response = send(&router, get("/login?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E")).await;
    let body = body_text(response).await;
    assert!(!body.contains("<script>"));
    assert!(body.contains("&lt;script&gt;"));
}

#[tokio::test]
async fn health_reports_ok_with_live_store() {
    let router = app();

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("X-App"));
    assert!(body_text(response).await.contains("\"store\":\"ok\""));
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let router = app();

    let response = send(&router, get("/admin")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oauth_routes_degrade_without_configured_providers() {
    let router = app();

    let response = send(&router, get("/auth/google")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/login?error="));

    let response = send(&router, get("/auth/facebook/callback?code=x&state=y")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/login?error="));
}
