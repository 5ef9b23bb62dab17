//! Module for the project and page API.
//!
//! Projects own an ordered list of pages; pages own their outline,
//! description and image versions.

pub mod handlers;
pub mod models;
pub mod routes;
