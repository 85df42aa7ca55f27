//! Errors that end a shipping session.

use clients::ClientError;
use fulfillment::{LabelError, ServerError, SessionError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop the shipping console.
///
/// Failed shipments are not in here: the session reports them and moves on.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client setup failed: {0}")]
    Client(#[from] ClientError),

    #[error("Fulfillment server error: {0}")]
    Server(#[from] ServerError),

    #[error("Session ended: {0}")]
    Session(#[from] SessionError),

    #[error("Label setup failed: {0}")]
    Label(#[from] LabelError),
}

pub type Result<T> = std::result::Result<T, CliError>;
