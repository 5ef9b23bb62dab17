//! Authentication module for token verification, the email whitelist gate
//! and admin access control.
//!
//! Authentication is only active when the identity provider URL and JWT
//! secret are configured; otherwise every request runs unscoped.

pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;

// Re-exports for convenience
pub use errors::*;
pub use handlers::*;
pub use middleware::*;
pub use models::*;
pub use routes::*;
pub use service::*;
