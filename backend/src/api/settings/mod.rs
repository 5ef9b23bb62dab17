//! Module for the settings API.
//!
//! Any change to the settings invalidates the cached AI service so the next
//! generation request picks up the new provider configuration.

pub mod handlers;
pub mod routes;
