//! In-process stores backing the `memory:` DSN.
//!
//! Same contracts as the PostgreSQL stores, held in mutex-guarded maps.
//! Used for development and tests; nothing survives a restart.

use super::error::AuthError;
use super::oauth::Provider;
use super::storage::{SessionStore, UserRecord, UserStore};
use super::utils::{generate_session_token, hash_session_token};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.lock().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_local(&self, email: &str, credential: &str) -> Result<UserRecord, AuthError> {
        // The whole check-then-insert runs under one lock, so concurrent
        // duplicate registrations serialize just like on a unique index.
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|user| user.email.as_deref() == Some(email))
        {
            return Err(AuthError::DuplicateUser);
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            credential: Some(credential.to_string()),
            google_id: None,
            facebook_id: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|user| provider_subject(user, provider) == Some(subject))
            .cloned())
    }

    async fn find_or_create_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<UserRecord, AuthError> {
        let mut users = self.users.lock().await;
        if let Some(user) = users
            .values()
            .find(|user| provider_subject(user, provider) == Some(subject))
        {
            return Ok(user.clone());
        }

        let mut user = UserRecord {
            id: Uuid::new_v4(),
            email: None,
            credential: None,
            google_id: None,
            facebook_id: None,
        };
        match provider {
            Provider::Google => user.google_id = Some(subject.to_string()),
            Provider::Facebook => user.facebook_id = Some(subject.to_string()),
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

fn provider_subject(user: &UserRecord, provider: Provider) -> Option<&str> {
    match provider {
        Provider::Google => user.google_id.as_deref(),
        Provider::Facebook => user.facebook_id.as_deref(),
    }
}

struct MemorySession {
    user_id: Uuid,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Vec<u8>, MemorySession>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String, AuthError> {
        let token = generate_session_token().map_err(AuthError::StoreUnavailable)?;
        let token_hash = hash_session_token(&token);
        let ttl = Duration::from_secs(u64::try_from(ttl_seconds).unwrap_or(0));

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, session| session.expires_at > Instant::now());
        sessions.insert(
            token_hash,
            MemorySession {
                user_id,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(token)
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, AuthError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token_hash) {
            Some(session) if session.expires_at > Instant::now() => Ok(Some(session.user_id)),
            Some(_) => {
                // Expired entries are reaped lazily at lookup time.
                sessions.remove(token_hash);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), AuthError> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token_hash);
        Ok(())
    }
}
