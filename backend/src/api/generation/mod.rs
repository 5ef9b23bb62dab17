//! Module for the generation API.
//!
//! Outline and refinement endpoints answer synchronously; description and
//! image batches start a background task that clients poll.

pub mod handlers;
pub mod routes;
