//! Auth handlers and supporting modules.
//!
//! This module coordinates local credential verification, delegated (OAuth)
//! sign-in, and session management.
//!
//! ## Credential strategies
//!
//! Local passwords pass through exactly one [`strategy::CredentialStrategy`]
//! chosen at startup. The `plaintext` and `encrypted` strategies reproduce
//! legacy deployments and are insecure on purpose; `hashed` (Argon2id) is the
//! default.
//!
//! ## Sessions
//!
//! A login hands the browser one opaque token in an `HttpOnly` cookie. The
//! session store maps the token's SHA-256 hash to a user id with a TTL;
//! every request resolves that id back to a full user record, and any
//! resolution failure is treated as anonymous.
//!
//! ## Delegated sign-in
//!
//! Google and Facebook accounts are keyed by provider subject id with
//! find-or-create semantics: the first callback creates the record, every
//! later one reuses it.

pub(crate) mod error;
mod login;
pub mod memory;
pub mod oauth;
mod register;
pub(crate) mod session;
mod state;
pub mod storage;
pub mod strategy;
pub(crate) mod types;
mod utils;

pub use login::login;
pub use oauth::{oauth_callback, oauth_start};
pub use register::register;
pub use session::logout;
pub use state::{AuthConfig, AuthState};

#[cfg(test)]
mod tests;
