//! Errors raised while constructing HTTP clients.

use thiserror::Error;

/// Errors that can occur while building a client.
///
/// Request-time failures are reported through the collaborator error types
/// of the `fulfillment` crate instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
