//! Persistence for users and their sessions.
//!
//! Both stores are trait objects so the HTTP layer never knows which backend
//! it is talking to. The PostgreSQL implementations live here; the
//! in-process ones are in [`super::memory`].
//!
//! Uniqueness is the store's job: duplicate registrations and provider
//! subject collisions resolve on unique indexes (or a single keyed map
//! mutation), never on application-level locking.

use super::error::AuthError;
use super::oauth::Provider;
use super::utils::{generate_session_token, hash_session_token, is_unique_violation};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row, postgres::PgRow};
use tracing::Instrument;
use uuid::Uuid;

/// Full user record as stored.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: Option<String>,
    pub credential: Option<String>,
    pub google_id: Option<String>,
    pub facebook_id: Option<String>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    /// Create a local account. A taken email surfaces as
    /// [`AuthError::DuplicateUser`].
    async fn create_local(&self, email: &str, credential: &str) -> Result<UserRecord, AuthError>;

    /// Look up an account by provider subject id.
    async fn find_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<UserRecord>, AuthError>;

    /// Look up by provider subject id, creating the account on first sight.
    /// Concurrent calls for the same subject converge on one record.
    async fn find_or_create_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<UserRecord, AuthError>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> Result<(), AuthError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session and return the raw token. Only the token's hash is
    /// stored.
    async fn insert(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String, AuthError>;

    /// Resolve a token hash to a user id. Unknown and expired hashes are
    /// `None`, not errors.
    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, AuthError>;

    /// Delete a session. Idempotent; deleting an absent session is fine.
    async fn delete(&self, token_hash: &[u8]) -> Result<(), AuthError>;
}

const USER_COLUMNS: &str = "id, email, credential, google_id, facebook_id";

fn row_to_user(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        credential: row.get("credential"),
        google_id: row.get("google_id"),
        facebook_id: row.get("facebook_id"),
    }
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AuthError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")
            .map_err(AuthError::StoreUnavailable)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")
            .map_err(AuthError::StoreUnavailable)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn create_local(&self, email: &str, credential: &str) -> Result<UserRecord, AuthError> {
        let query = format!(
            "INSERT INTO users (email, credential) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let result = sqlx::query(&query)
            .bind(email)
            .bind(credential)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(row) => Ok(row_to_user(&row)),
            Err(err) if is_unique_violation(&err) => Err(AuthError::DuplicateUser),
            Err(err) => Err(AuthError::StoreUnavailable(
                anyhow::Error::new(err).context("failed to insert user"),
            )),
        }
    }

    async fn find_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<UserRecord>, AuthError> {
        let column = provider.subject_column();
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(subject)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by provider subject")
            .map_err(AuthError::StoreUnavailable)?;
        Ok(row.as_ref().map(row_to_user))
    }

    async fn find_or_create_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<UserRecord, AuthError> {
        // The upsert races safely: concurrent first callbacks for the same
        // subject both land on the unique index and one row wins.
        let column = provider.subject_column();
        let query = format!(
            "INSERT INTO users ({column}) VALUES ($1) \
             ON CONFLICT ({column}) DO UPDATE SET updated_at = NOW() \
             RETURNING {USER_COLUMNS}"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(subject)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to find-or-create provider user")
            .map_err(AuthError::StoreUnavailable)?;
        Ok(row_to_user(&row))
    }

    async fn ping(&self) -> Result<(), AuthError> {
        let span = tracing::info_span!(
            "db.ping",
            db.system = "postgresql",
            db.operation = "PING"
        );
        async {
            let mut conn = self
                .pool
                .acquire()
                .await
                .context("failed to acquire database connection")?;
            conn.ping().await.context("failed to ping database")
        }
        .instrument(span)
        .await
        .map_err(AuthError::StoreUnavailable)
    }
}

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, user_id: Uuid, ttl_seconds: i64) -> Result<String, AuthError> {
        // Generate a random token, store only its hash, and return the raw
        // value so the caller can set the session cookie.
        let query = r"
            INSERT INTO user_sessions (user_id, session_hash, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );

        for _ in 0..3 {
            let token = generate_session_token().map_err(AuthError::StoreUnavailable)?;
            let token_hash = hash_session_token(&token);
            let result = sqlx::query(query)
                .bind(user_id)
                .bind(token_hash)
                .bind(ttl_seconds)
                .execute(&self.pool)
                .instrument(span.clone())
                .await;

            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => {
                    return Err(AuthError::StoreUnavailable(
                        anyhow::Error::new(err).context("failed to insert session"),
                    ));
                }
            }
        }

        Err(AuthError::StoreUnavailable(anyhow!(
            "failed to generate unique session token"
        )))
    }

    async fn lookup(&self, token_hash: &[u8]) -> Result<Option<Uuid>, AuthError> {
        // Only unexpired sessions resolve.
        let query = r"
            SELECT user_id
            FROM user_sessions
            WHERE session_hash = $1
              AND expires_at > NOW()
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")
            .map_err(AuthError::StoreUnavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Record activity for audit/visibility without extending the TTL.
        let query = r"
            UPDATE user_sessions
            SET last_seen_at = NOW()
            WHERE session_hash = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update session last_seen_at")
            .map_err(AuthError::StoreUnavailable)?;

        Ok(Some(row.get("user_id")))
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<(), AuthError> {
        // Logout is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM user_sessions WHERE session_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")
            .map_err(AuthError::StoreUnavailable)?;
        Ok(())
    }
}
