use crate::{
    api,
    api::handlers::auth::{
        AuthConfig, AuthState,
        memory::{MemorySessionStore, MemoryUserStore},
        oauth::{OAuthProvider, OAuthProviders, Provider},
        storage::{PgSessionStore, PgUserStore, SessionStore, UserStore},
        strategy::{CredentialStrategy, EncryptedStrategy, HashedStrategy, PlaintextStrategy},
    },
    cli::commands::auth::{
        ProviderCredentials, SCHEME_ENCRYPTED, SCHEME_HASHED, SCHEME_PLAINTEXT,
    },
};
use anyhow::{Context, Result, anyhow};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub session_ttl_seconds: i64,
    pub oauth_state_ttl_seconds: u64,
    pub credential_scheme: String,
    pub encryption_key: Option<SecretString>,
    pub google: Option<ProviderCredentials>,
    pub facebook: Option<ProviderCredentials>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is inconsistent, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = AuthConfig::new(args.base_url.clone())
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_oauth_state_ttl_seconds(args.oauth_state_ttl_seconds);

    let strategy = build_strategy(&args)?;

    let mut providers = OAuthProviders::new(Duration::from_secs(args.oauth_state_ttl_seconds));
    if let Some(credentials) = &args.google {
        providers = providers.with_provider(build_provider(Provider::Google, credentials, &config)?);
    }
    if let Some(credentials) = &args.facebook {
        providers =
            providers.with_provider(build_provider(Provider::Facebook, credentials, &config)?);
    }

    let (users, sessions) = build_stores(&args.dsn).await?;

    info!(
        "Starting with credential scheme '{}' against {}",
        args.credential_scheme,
        if args.dsn == "memory:" {
            "in-process stores"
        } else {
            "PostgreSQL"
        }
    );

    let state = Arc::new(AuthState::new(config, strategy, users, sessions, providers));

    api::new(args.port, state).await
}

fn build_strategy(args: &Args) -> Result<Arc<dyn CredentialStrategy>> {
    match args.credential_scheme.as_str() {
        SCHEME_PLAINTEXT => {
            warn!("Credential scheme 'plaintext' stores passwords verbatim; legacy mode only");
            Ok(Arc::new(PlaintextStrategy))
        }
        SCHEME_ENCRYPTED => {
            warn!("Credential scheme 'encrypted' is reversible; a key leak exposes every record");
            let key = args
                .encryption_key
                .as_ref()
                .ok_or_else(|| anyhow!("--encryption-key is required for the 'encrypted' scheme"))?;
            let strategy = EncryptedStrategy::from_hex(key.expose_secret())
                .context("invalid --encryption-key")?;
            Ok(Arc::new(strategy))
        }
        SCHEME_HASHED => Ok(Arc::new(HashedStrategy::new())),
        other => Err(anyhow!("unknown credential scheme: {other}")),
    }
}

fn build_provider(
    kind: Provider,
    credentials: &ProviderCredentials,
    config: &AuthConfig,
) -> Result<OAuthProvider> {
    OAuthProvider::new(
        kind,
        credentials.client_id.clone(),
        credentials.client_secret.expose_secret().to_string(),
        config.callback_url(kind),
    )
    .with_context(|| format!("failed to configure {kind} sign-in"))
}

async fn build_stores(dsn: &str) -> Result<(Arc<dyn UserStore>, Arc<dyn SessionStore>)> {
    if dsn == "memory:" {
        return Ok((
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemorySessionStore::new()),
        ));
    }

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    Ok((
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgSessionStore::new(pool)),
    ))
}
