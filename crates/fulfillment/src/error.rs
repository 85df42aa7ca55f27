//! Error types for fulfillment and its collaborators.

use common::{ShipmentId, ValidationError};
use thiserror::Error;

use crate::steps;

/// Errors reported by the postage provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostageError {
    /// The provider answered with an error status.
    #[error("Postage provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The provider could not be reached.
    #[error("Postage provider unreachable: {0}")]
    Transport(String),

    /// The provider answered with something we could not interpret.
    #[error("Invalid postage provider response: {0}")]
    InvalidResponse(String),

    /// No rate was offered by any of the requested carriers.
    #[error("No rates available from carriers: {carriers}")]
    NoRates { carriers: String },

    /// The provider could not verify an address.
    #[error("Address verification failed: {0}")]
    AddressRejected(String),

    /// In-memory provider configured to fail.
    #[error("Postage provider unavailable: {0}")]
    Unavailable(String),
}

/// Errors reported by the fulfillment server.
///
/// Lookup misses are retryable; only connectivity failures are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// The requested record does not exist.
    #[error("Not found on fulfillment server: {0}")]
    NotFound(String),

    /// The server could not be reached.
    #[error("Fulfillment server unreachable: {0}")]
    Connectivity(String),

    /// The server refused the request.
    #[error("Fulfillment server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The server answered with something we could not interpret.
    #[error("Invalid fulfillment server response: {0}")]
    InvalidResponse(String),
}

impl ServerError {
    /// Returns true if the error should abort the session rather than ask for new input.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Connectivity(_))
    }

    /// Returns true if the lookup simply found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServerError::NotFound(_))
    }
}

/// Errors reported by the geocoding provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodingError {
    #[error("Geocoding request timed out")]
    Timeout,

    #[error("Geocoding transport error: {0}")]
    Transport(String),

    #[error("Geocoding API error ({status}): {message}")]
    Api { status: String, message: String },
}

/// Errors while fetching or composing a label image.
#[derive(Debug, Error)]
pub enum LabelError {
    /// The label could not be downloaded.
    #[error("Failed to fetch label from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The label or logo bytes are not a readable image.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The logo file could not be read.
    #[error("Failed to read logo: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while handing a label to the printer.
#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Printer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode label: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Label viewer exited with status {status}")]
    Viewer { status: String },

    /// In-memory printer configured to fail.
    #[error("Printer unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while fulfilling a shipment.
///
/// Every variant names the stage it came from so an operator can tell
/// whether postage was charged.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Input rejected before anything was purchased.
    #[error("Validation failed, no postage purchased: {0}")]
    Validation(#[from] ValidationError),

    /// Buying postage failed; nothing was charged.
    #[error("Saga step 'purchase_postage' failed, no postage purchased: {0}")]
    Purchase(#[source] PostageError),

    /// Registering the shipment with the fulfillment server failed.
    #[error("Saga step 'register_shipment' failed: {0}")]
    Registration(#[source] ServerError),

    /// Fetching or composing the label failed.
    #[error("Saga step 'print_label' failed: {0}")]
    Label(#[source] LabelError),

    /// The printer refused the label.
    #[error("Saga step 'print_label' failed: {0}")]
    Printer(#[source] PrinterError),

    /// The purchased shipment lacks data a later step needs.
    #[error("Saga step '{step}' failed: shipment {shipment_id} has no {field}")]
    IncompleteShipment {
        step: &'static str,
        shipment_id: ShipmentId,
        field: &'static str,
    },

    /// A step failed after purchase and the refund failed too.
    ///
    /// Postage was charged and not refunded.
    #[error(
        "Refund of shipment {shipment_id} failed after: {cause}; postage was charged and NOT refunded: {refund}"
    )]
    CompensationFailed {
        shipment_id: ShipmentId,
        cause: Box<SagaError>,
        refund: PostageError,
    },
}

impl SagaError {
    /// Returns the saga stage the error came from.
    pub fn stage(&self) -> &'static str {
        match self {
            SagaError::Validation(_) => steps::STEP_VALIDATE,
            SagaError::Purchase(_) => steps::STEP_PURCHASE_POSTAGE,
            SagaError::Registration(_) => steps::STEP_REGISTER_SHIPMENT,
            SagaError::Label(_) | SagaError::Printer(_) => steps::STEP_PRINT_LABEL,
            SagaError::IncompleteShipment { step, .. } => *step,
            SagaError::CompensationFailed { .. } => steps::STEP_REFUND_POSTAGE,
        }
    }

    /// Returns true if money was spent and not given back.
    pub fn postage_charged(&self) -> bool {
        matches!(self, SagaError::CompensationFailed { .. })
    }
}

/// Errors from the interactive shipment sources.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading operator input failed.
    #[error("Prompt I/O error: {0}")]
    Prompt(#[from] std::io::Error),

    /// The fulfillment server failed in a way that ends the session.
    #[error("Fulfillment server error: {0}")]
    Server(#[from] ServerError),
}
