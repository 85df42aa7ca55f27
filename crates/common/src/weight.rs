//! Parcel weight.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Ounces in one pound.
pub const OUNCES_PER_POUND: u32 = 16;

/// A strictly positive parcel weight, stored in ounces.
///
/// Operators enter pounds; the postage provider expects ounces. Zero or
/// negative input is rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Weight {
    ounces: u32,
}

impl Weight {
    /// Creates a weight from whole pounds.
    pub fn from_pounds(pounds: i64) -> Result<Self, ValidationError> {
        if pounds <= 0 {
            return Err(ValidationError::NonPositiveWeight { value: pounds });
        }
        let ounces = u32::try_from(pounds)
            .ok()
            .and_then(|p| p.checked_mul(OUNCES_PER_POUND))
            .ok_or(ValidationError::WeightOverflow(pounds))?;
        Ok(Self { ounces })
    }

    /// Creates a weight from whole ounces.
    pub fn from_ounces(ounces: i64) -> Result<Self, ValidationError> {
        if ounces <= 0 {
            return Err(ValidationError::NonPositiveWeight { value: ounces });
        }
        let ounces = u32::try_from(ounces).map_err(|_| ValidationError::WeightOverflow(ounces))?;
        Ok(Self { ounces })
    }

    /// Returns the weight in ounces.
    pub fn ounces(&self) -> u32 {
        self.ounces
    }

    /// Returns the weight in (possibly fractional) pounds.
    pub fn pounds(&self) -> f64 {
        f64::from(self.ounces) / f64::from(OUNCES_PER_POUND)
    }
}

/// Parses operator input in whole pounds.
impl FromStr for Weight {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let pounds: i64 = trimmed
            .parse()
            .map_err(|_| ValidationError::InvalidWeight(trimmed.to_string()))?;
        Self::from_pounds(pounds)
    }
}

impl TryFrom<u32> for Weight {
    type Error = ValidationError;

    fn try_from(ounces: u32) -> Result<Self, Self::Error> {
        Self::from_ounces(i64::from(ounces))
    }
}

impl From<Weight> for u32 {
    fn from(weight: Weight) -> Self {
        weight.ounces
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} oz", self.ounces)
    }
}
