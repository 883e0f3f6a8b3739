//! Auth state and configuration.

use super::oauth::{OAuthProviders, Provider};
use super::storage::{SessionStore, UserStore};
use super::strategy::CredentialStrategy;
use std::sync::Arc;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_OAUTH_STATE_TTL_SECONDS: u64 = 10 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    session_ttl_seconds: i64,
    oauth_state_ttl_seconds: u64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        // Normalized once so URL building never doubles a slash.
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            oauth_state_ttl_seconds: DEFAULT_OAUTH_STATE_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_oauth_state_ttl_seconds(mut self, seconds: u64) -> Self {
        self.oauth_state_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn oauth_state_ttl_seconds(&self) -> u64 {
        self.oauth_state_ttl_seconds
    }

    /// Only mark cookies secure when the app is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Redirect URL registered with a provider.
    #[must_use]
    pub fn callback_url(&self, provider: Provider) -> String {
        format!("{}/auth/{}/callback", self.base_url, provider.as_str())
    }
}

/// Everything the auth routes need, constructed once at startup and injected
/// as an extension. No module-level singletons.
pub struct AuthState {
    config: AuthConfig,
    strategy: Arc<dyn CredentialStrategy>,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    oauth: OAuthProviders,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        strategy: Arc<dyn CredentialStrategy>,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        oauth: OAuthProviders,
    ) -> Self {
        Self {
            config,
            strategy,
            users,
            sessions,
            oauth,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn strategy(&self) -> &dyn CredentialStrategy {
        self.strategy.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthProviders {
        &self.oauth
    }
}
