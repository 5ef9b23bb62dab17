//! Module for template images.
//!
//! A project carries at most one template image that steers the visual style
//! of its slides. User templates are a reusable per-tenant library.

pub mod handlers;
pub mod models;
pub mod routes;
