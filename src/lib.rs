//! # Segreti (Session Authentication Service)
//!
//! `segreti` is a small server-rendered authentication service: users register
//! and log in, and a protected page is gated behind a server-side session.
//! Its point is the pluggable credential layer: the same five routes run
//! against interchangeable credential-storage strategies.
//!
//! ## Credential Strategies
//!
//! The active strategy is selected at startup (`--credential-scheme`):
//!
//! - **`hashed`** (default): Argon2id with a per-record random salt; the
//!   stored PHC string carries its own parameters.
//! - **`plaintext`**: stores and compares the raw password. Insecure by
//!   design; kept only to model legacy deployments.
//! - **`encrypted`**: AES-256-GCM under a single process-wide key. A key
//!   compromise exposes every stored credential; also a deliberate legacy
//!   mode, not a recommendation.
//!
//! Google and Facebook sign-in are independent of the local scheme: the
//! provider proves identity and accounts are found-or-created by provider
//! subject id.
//!
//! ## Sessions
//!
//! Sessions are opaque 32-byte tokens handed to the browser in an `HttpOnly`
//! cookie. The database only ever stores the SHA-256 hash of a token, mapped
//! to a user id with a TTL. A session that fails to resolve (missing,
//! expired, or pointing at a vanished user) degrades to anonymous, never to
//! an error.
//!
//! ## Storage
//!
//! User and session stores are trait objects with a PostgreSQL backend and an
//! in-process backend (`--dsn memory:`) for development and tests.
//! Uniqueness (duplicate registration, provider subject collisions) is
//! enforced by the store, not by application-level locking.

pub mod api;
pub mod cli;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
