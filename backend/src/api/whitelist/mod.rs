//! Module for whitelist administration.
//!
//! When auth is enabled only whitelisted or admin emails may sign in. Every
//! route except `check-admin` requires an admin.

pub mod handlers;
pub mod routes;
