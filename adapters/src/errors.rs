//! Custom error types specific to the `adapters` crate.
//!
//! This module defines errors that can occur while configuring a provider,
//! calling a remote AI or identity API, or decoding what it sent back,
//! providing a unified error handling mechanism for all external calls.

use thiserror::Error;

pub type AdapterResult<T> = Result<T, AdapterError>;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Provider configuration error: {0}")]
    Configuration(String),
    #[error("Request to {provider} failed: {message}")]
    Transport { provider: &'static str, message: String },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("Unexpected response from {provider}: {message}")]
    InvalidResponse { provider: &'static str, message: String },
    #[error("No image found in response from {0}")]
    NoImage(&'static str),
    #[error("{0} does not support image input")]
    Unsupported(&'static str),
    #[error("Token has expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl AdapterError {
    /// Transport failures, rate limiting and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn transport(provider: &'static str, err: reqwest::Error) -> Self {
        Self::Transport {
            provider,
            message: err.to_string(),
        }
    }

    pub(crate) fn invalid(provider: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider,
            message: message.into(),
        }
    }
}
