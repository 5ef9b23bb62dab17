//! Module for material images.
//!
//! Materials are standalone images a user can reference from page
//! descriptions. They belong to a project or, without one, are global.

pub mod handlers;
pub mod routes;
