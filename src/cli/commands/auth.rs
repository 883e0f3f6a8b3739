use anyhow::{Result, anyhow};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const SCHEME_PLAINTEXT: &str = "plaintext";
pub const SCHEME_HASHED: &str = "hashed";
pub const SCHEME_ENCRYPTED: &str = "encrypted";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    let command = with_scheme_args(command);
    with_provider_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("Public base URL, used for OAuth redirects and the cookie Secure flag")
                .env("SEGRETI_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session cookie TTL in seconds")
                .env("SEGRETI_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("oauth-state-ttl-seconds")
                .long("oauth-state-ttl-seconds")
                .help("TTL for pending OAuth authorization state")
                .env("SEGRETI_OAUTH_STATE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
}

fn with_scheme_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("credential-scheme")
                .long("credential-scheme")
                .help("Local credential storage scheme")
                .long_help(
                    "Local credential storage scheme: 'hashed' (Argon2id, recommended), 'plaintext' (legacy, insecure), or 'encrypted' (AES-256-GCM under a shared key, legacy).",
                )
                .env("SEGRETI_CREDENTIAL_SCHEME")
                .default_value(SCHEME_HASHED)
                .value_parser([SCHEME_PLAINTEXT, SCHEME_HASHED, SCHEME_ENCRYPTED]),
        )
        .arg(
            Arg::new("encryption-key")
                .long("encryption-key")
                .help("32-byte hex key for the 'encrypted' scheme (64 hex chars)")
                .env("SEGRETI_ENCRYPTION_KEY"),
        )
}

fn with_provider_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("Google OAuth client id")
                .env("SEGRETI_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new("google-client-secret")
                .long("google-client-secret")
                .help("Google OAuth client secret")
                .env("SEGRETI_GOOGLE_CLIENT_SECRET"),
        )
        .arg(
            Arg::new("facebook-client-id")
                .long("facebook-client-id")
                .help("Facebook OAuth client id")
                .env("SEGRETI_FACEBOOK_CLIENT_ID"),
        )
        .arg(
            Arg::new("facebook-client-secret")
                .long("facebook-client-secret")
                .help("Facebook OAuth client secret")
                .env("SEGRETI_FACEBOOK_CLIENT_SECRET"),
        )
}

/// OAuth client credentials for one provider.
#[derive(Clone, Debug)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub base_url: String,
    pub session_ttl_seconds: i64,
    pub oauth_state_ttl_seconds: u64,
    pub credential_scheme: String,
    pub encryption_key: Option<SecretString>,
    pub google: Option<ProviderCredentials>,
    pub facebook: Option<ProviderCredentials>,
}

impl Options {
    /// Extract auth options from parsed CLI matches.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider is half-configured (id without secret
    /// or vice versa) or the 'encrypted' scheme is missing its key.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let base_url = matches
            .get_one::<String>("base-url")
            .cloned()
            .unwrap_or_else(|| "http://localhost:8080".to_string());
        let session_ttl_seconds = matches
            .get_one::<i64>("session-ttl-seconds")
            .copied()
            .unwrap_or(604_800);
        let oauth_state_ttl_seconds = matches
            .get_one::<u64>("oauth-state-ttl-seconds")
            .copied()
            .unwrap_or(600);
        let credential_scheme = matches
            .get_one::<String>("credential-scheme")
            .cloned()
            .unwrap_or_else(|| SCHEME_HASHED.to_string());
        let encryption_key = matches
            .get_one::<String>("encryption-key")
            .cloned()
            .map(SecretString::from);

        if credential_scheme == SCHEME_ENCRYPTED && encryption_key.is_none() {
            return Err(anyhow!(
                "missing required argument: --encryption-key (required for the 'encrypted' scheme)"
            ));
        }

        let google = provider_credentials(matches, "google")?;
        let facebook = provider_credentials(matches, "facebook")?;

        Ok(Self {
            base_url,
            session_ttl_seconds,
            oauth_state_ttl_seconds,
            credential_scheme,
            encryption_key,
            google,
            facebook,
        })
    }
}

/// A provider is active only when both halves of its credentials are present.
fn provider_credentials(
    matches: &clap::ArgMatches,
    provider: &str,
) -> Result<Option<ProviderCredentials>> {
    let client_id = matches.get_one::<String>(&format!("{provider}-client-id"));
    let client_secret = matches.get_one::<String>(&format!("{provider}-client-secret"));

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => Ok(Some(ProviderCredentials {
            client_id: id.clone(),
            client_secret: SecretString::from(secret.clone()),
        })),
        (None, None) => Ok(None),
        _ => Err(anyhow!(
            "provider '{provider}' needs both --{provider}-client-id and --{provider}-client-secret"
        )),
    }
}
