//! Validation errors for shared value types.

use thiserror::Error;

/// Input that failed validation before any side effect was attempted.
///
/// Validation errors are never retried; the caller is expected to ask for
/// new input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required address field is empty.
    #[error("Address field '{field}' must not be empty")]
    MissingField { field: &'static str },

    /// Weight is zero or negative.
    #[error("Weight must be positive, got {value}")]
    NonPositiveWeight { value: i64 },

    /// Weight text could not be parsed as a whole number.
    #[error("Invalid weight: {0:?}")]
    InvalidWeight(String),

    /// Weight is too large to represent in ounces.
    #[error("Weight is too large: {0}")]
    WeightOverflow(i64),

    /// A money amount could not be parsed.
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    /// An identifier token was empty.
    #[error("Identifier must not be empty")]
    EmptyIdentifier,
}
