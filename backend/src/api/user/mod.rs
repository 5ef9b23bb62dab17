//! Module for the user profile endpoint.
//!
//! Distinct from `auth`: the profile reads the synced user record for the
//! already-authenticated caller.

pub mod handlers;
pub mod routes;
