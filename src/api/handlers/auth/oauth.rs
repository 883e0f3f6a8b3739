//! Delegated sign-in through the OAuth 2.0 authorization-code flow.
//!
//! The only local responsibility is the two route halves: send the browser to
//! the provider's consent endpoint, and on callback validate the response,
//! extract the subject id, and find-or-create the account. Token exchange and
//! signatures stay inside the `oauth2` crate and the provider.
//!
//! Pending authorizations (CSRF state → PKCE verifier) live in an in-process
//! map with a TTL; an entry is consumed on first use, so a replayed callback
//! with the same state falls through to a login redirect.

use super::error::{AuthError, internal_error, redirect_with_error};
use super::session::establish_session;
use super::state::AuthState;
use super::types::CallbackQuery;
use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Redirect, Response},
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
    basic::BasicClient,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    /// Parse the `{provider}` path segment.
    #[must_use]
    pub fn from_path(value: &str) -> Option<Self> {
        match value {
            "google" => Some(Self::Google),
            "facebook" => Some(Self::Facebook),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }

    /// Column holding this provider's subject id in the users table.
    pub(super) const fn subject_column(self) -> &'static str {
        match self {
            Self::Google => "google_id",
            Self::Facebook => "facebook_id",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity asserted by a provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub provider: Provider,
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Google user info from the API.
#[derive(Debug, Deserialize)]
struct GoogleProfile {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

/// Facebook user info from the Graph API.
#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    email: Option<String>,
    name: Option<String>,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

pub struct OAuthProvider {
    kind: Provider,
    client: ConfiguredClient,
    scopes: &'static [&'static str],
    userinfo_url: &'static str,
}

impl OAuthProvider {
    /// Build a configured provider client.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint or redirect URL fails to parse.
    pub fn new(
        kind: Provider,
        client_id: String,
        client_secret: String,
        redirect_url: String,
    ) -> Result<Self> {
        let (auth_url, token_url, scopes, userinfo_url): (_, _, &'static [&'static str], _) =
            match kind {
                Provider::Google => (
                    "https://accounts.google.com/o/oauth2/v2/auth",
                    "https://oauth2.googleapis.com/token",
                    &["openid", "email", "profile"][..],
                    "https://www.googleapis.com/oauth2/v2/userinfo",
                ),
                Provider::Facebook => (
                    "https://www.facebook.com/v19.0/dialog/oauth",
                    "https://graph.facebook.com/v19.0/oauth/access_token",
                    &["public_profile", "email"][..],
                    "https://graph.facebook.com/me?fields=id,name,email",
                ),
            };

        let client = BasicClient::new(ClientId::new(client_id))
            .set_client_secret(ClientSecret::new(client_secret))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).context("invalid auth URL")?)
            .set_token_uri(TokenUrl::new(token_url.to_string()).context("invalid token URL")?)
            .set_redirect_uri(RedirectUrl::new(redirect_url).context("invalid redirect URL")?);

        Ok(Self {
            kind,
            client,
            scopes,
            userinfo_url,
        })
    }

    #[must_use]
    pub const fn kind(&self) -> Provider {
        self.kind
    }

    /// Build the consent URL. Returns `(url, csrf_state, pkce_verifier)`;
    /// the caller parks state and verifier until the callback.
    #[must_use]
    pub fn authorize_url(&self) -> (String, String, String) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self.client.authorize_url(CsrfToken::new_random);
        for scope in self.scopes {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }
        let (auth_url, csrf_state) = request.set_pkce_challenge(pkce_challenge).url();

        (
            auth_url.to_string(),
            csrf_state.secret().clone(),
            pkce_verifier.secret().clone(),
        )
    }

    /// Exchange the authorization code and resolve the provider identity.
    ///
    /// # Errors
    ///
    /// Any failure (exchange rejected, profile fetch failed, malformed
    /// profile) comes back as [`AuthError::Provider`].
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: String,
    ) -> Result<ProviderIdentity, AuthError> {
        // The token endpoint must not be followed through redirects, and a
        // stuck provider must not hold the request open indefinitely.
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .map_err(|err| AuthError::Provider(format!("http client setup failed: {err}")))?;

        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
            .request_async(&http_client)
            .await
            .map_err(|err| AuthError::Provider(format!("token exchange failed: {err}")))?;

        self.fetch_identity(&http_client, token.access_token().secret())
            .await
    }

    async fn fetch_identity(
        &self,
        http_client: &reqwest::Client,
        access_token: &str,
    ) -> Result<ProviderIdentity, AuthError> {
        let response = http_client
            .get(self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| AuthError::Provider(format!("profile fetch failed: {err}")))?;

        match self.kind {
            Provider::Google => {
                let profile: GoogleProfile = response
                    .json()
                    .await
                    .map_err(|err| AuthError::Provider(format!("malformed profile: {err}")))?;
                Ok(ProviderIdentity {
                    provider: self.kind,
                    subject: profile.id,
                    email: profile.email,
                    name: profile.name,
                })
            }
            Provider::Facebook => {
                let profile: FacebookProfile = response
                    .json()
                    .await
                    .map_err(|err| AuthError::Provider(format!("malformed profile: {err}")))?;
                Ok(ProviderIdentity {
                    provider: self.kind,
                    subject: profile.id,
                    email: profile.email,
                    name: profile.name,
                })
            }
        }
    }
}

struct PendingAuthorization {
    provider: Provider,
    pkce_verifier: String,
    created_at: Instant,
}

/// Configured providers plus the pending-authorization map.
pub struct OAuthProviders {
    google: Option<OAuthProvider>,
    facebook: Option<OAuthProvider>,
    state_ttl: Duration,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
}

impl OAuthProviders {
    #[must_use]
    pub fn new(state_ttl: Duration) -> Self {
        Self {
            google: None,
            facebook: None,
            state_ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: OAuthProvider) -> Self {
        match provider.kind() {
            Provider::Google => self.google = Some(provider),
            Provider::Facebook => self.facebook = Some(provider),
        }
        self
    }

    #[must_use]
    pub fn get(&self, kind: Provider) -> Option<&OAuthProvider> {
        match kind {
            Provider::Google => self.google.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
        }
    }

    #[must_use]
    pub fn is_configured(&self, kind: Provider) -> bool {
        self.get(kind).is_some()
    }

    pub(super) async fn store_pending(
        &self,
        csrf_state: String,
        provider: Provider,
        pkce_verifier: String,
    ) {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, entry| entry.created_at.elapsed() < self.state_ttl);
        pending.insert(
            csrf_state,
            PendingAuthorization {
                provider,
                pkce_verifier,
                created_at: Instant::now(),
            },
        );
    }

    /// Consume a pending authorization. `None` for unknown, expired, or
    /// wrong-provider state; each of those means the callback is not ours.
    pub(super) async fn take_pending(&self, csrf_state: &str, provider: Provider) -> Option<String> {
        let mut pending = self.pending.lock().await;
        match pending.remove(csrf_state) {
            Some(entry)
                if entry.provider == provider && entry.created_at.elapsed() < self.state_ttl =>
            {
                Some(entry.pkce_verifier)
            }
            _ => None,
        }
    }
}

/// GET `/auth/{provider}`: redirect to the provider's consent endpoint.
pub async fn oauth_start(
    Path(provider): Path<String>,
    Extension(state): Extension<Arc<AuthState>>,
) -> Response {
    let Some(kind) = Provider::from_path(&provider) else {
        return redirect_with_error("/login", "Unknown sign-in provider").into_response();
    };
    let Some(oauth_provider) = state.oauth().get(kind) else {
        warn!("Sign-in requested for unconfigured provider {kind}");
        return redirect_with_error("/login", "Sign-in with this provider is not available")
            .into_response();
    };

    let (auth_url, csrf_state, pkce_verifier) = oauth_provider.authorize_url();
    state
        .oauth()
        .store_pending(csrf_state, kind, pkce_verifier)
        .await;

    Redirect::to(&auth_url).into_response()
}

/// GET `/auth/{provider}/callback`: validate the response, resolve the
/// identity, find-or-create the account, and open a session.
pub async fn oauth_callback(
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    Extension(state): Extension<Arc<AuthState>>,
) -> Response {
    let Some(kind) = Provider::from_path(&provider) else {
        return redirect_with_error("/login", "Unknown sign-in provider").into_response();
    };

    if let Some(provider_error) = query.error {
        warn!("{kind} sign-in denied: {provider_error}");
        return redirect_with_error("/login", "Sign-in was cancelled or denied").into_response();
    }

    let (Some(code), Some(csrf_state)) = (query.code, query.state) else {
        return redirect_with_error("/login", "Invalid provider response").into_response();
    };

    let Some(oauth_provider) = state.oauth().get(kind) else {
        return redirect_with_error("/login", "Sign-in with this provider is not available")
            .into_response();
    };

    let Some(pkce_verifier) = state.oauth().take_pending(&csrf_state, kind).await else {
        warn!("{kind} callback with unknown or expired state");
        return redirect_with_error("/login", "Sign-in expired, please try again").into_response();
    };

    let identity = match oauth_provider.exchange_code(&code, pkce_verifier).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!("{kind} sign-in failed: {err}");
            return redirect_with_error("/login", "Sign-in failed, please try again")
                .into_response();
        }
    };

    let user = match state
        .users()
        .find_or_create_by_provider(kind, &identity.subject)
        .await
    {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to find-or-create provider user: {err}");
            return internal_error();
        }
    };

    match establish_session(&state, user.id).await {
        Ok(headers) => (headers, Redirect::to("/secrets")).into_response(),
        Err(err) => {
            error!("Failed to establish session: {err}");
            internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: Provider) -> OAuthProvider {
        OAuthProvider::new(
            kind,
            "client-id".to_string(),
            "client-secret".to_string(),
            format!("http://localhost:8080/auth/{kind}/callback"),
        )
        .expect("provider")
    }

    #[test]
    fn provider_path_parsing() {
        assert_eq!(Provider::from_path("google"), Some(Provider::Google));
        assert_eq!(Provider::from_path("facebook"), Some(Provider::Facebook));
        assert_eq!(Provider::from_path("github"), None);
        assert_eq!(Provider::from_path(""), None);
    }

    #[test]
    fn authorize_url_targets_consent_endpoint() {
        let (url, csrf_state, pkce_verifier) = provider(Provider::Google).authorize_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("code_challenge="));
        assert!(url.contains(&format!("state={csrf_state}")));
        assert!(!url.contains(&pkce_verifier));
    }

    #[test]
    fn authorize_url_requests_scopes() {
        let (url, _, _) = provider(Provider::Facebook).authorize_url();
        assert!(url.starts_with("https://www.facebook.com/v19.0/dialog/oauth?"));
        assert!(url.contains("public_profile"));
    }

    #[tokio::test]
    async fn pending_state_is_consumed_on_take() {
        let providers = OAuthProviders::new(Duration::from_secs(60));
        providers
            .store_pending("state-1".to_string(), Provider::Google, "verifier".to_string())
            .await;

        let taken = providers.take_pending("state-1", Provider::Google).await;
        assert_eq!(taken.as_deref(), Some("verifier"));

        // A replay of the same state finds nothing.
        assert!(providers.take_pending("state-1", Provider::Google).await.is_none());
    }

    #[tokio::test]
    async fn pending_state_is_provider_scoped() {
        let providers = OAuthProviders::new(Duration::from_secs(60));
        providers
            .store_pending("state-2".to_string(), Provider::Google, "verifier".to_string())
            .await;

        assert!(providers.take_pending("state-2", Provider::Facebook).await.is_none());
    }

    #[tokio::test]
    async fn pending_state_expires() {
        let providers = OAuthProviders::new(Duration::from_secs(0));
        providers
            .store_pending("state-3".to_string(), Provider::Google, "verifier".to_string())
            .await;

        assert!(providers.take_pending("state-3", Provider::Google).await.is_none());
    }
}
