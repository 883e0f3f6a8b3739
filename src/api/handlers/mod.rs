//! Route handlers for segreti.
//!
//! `auth` owns registration, login, logout, and the OAuth routes; `pages`
//! renders the public and protected pages; `health` reports liveness.

pub mod auth;
pub mod health;
pub mod pages;
