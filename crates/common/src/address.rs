//! Postal addresses.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Country every address is shipped within.
pub const DEFAULT_COUNTRY: &str = "US";

/// A recipient or return address as the fulfillment server and prompts produce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Addressee line.
    #[serde(alias = "addressee")]
    pub name: String,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

impl Address {
    /// Creates an address without a second street line.
    pub fn new(
        name: impl Into<String>,
        street1: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        zipcode: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            street1: street1.into(),
            street2: None,
            city: city.into(),
            state: state.into(),
            zipcode: zipcode.into(),
        }
    }

    /// Sets the second street line.
    pub fn with_street2(mut self, street2: impl Into<String>) -> Self {
        self.street2 = Some(street2.into());
        self
    }

    /// Replaces the addressee line.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the second street line, treating blank as absent.
    pub fn street2(&self) -> Option<&str> {
        self.street2.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Checks that every required field is non-empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("name", &self.name),
            ("street1", &self.street1),
            ("city", &self.city),
            ("state", &self.state),
            ("zipcode", &self.zipcode),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField { field });
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", self.street1)?;
        if let Some(street2) = self.street2() {
            writeln!(f, "{street2}")?;
        }
        write!(f, "{}, {} {}", self.city, self.state, self.zipcode)
    }
}

/// Address in the shape the postage provider requires.
///
/// Adds the implicit country and an empty phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub name: String,
    pub street1: String,
    pub street2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
}

impl From<&Address> for PostalAddress {
    fn from(address: &Address) -> Self {
        Self {
            name: address.name.clone(),
            street1: address.street1.clone(),
            street2: address.street2().unwrap_or_default().to_string(),
            city: address.city.clone(),
            state: address.state.clone(),
            zip: address.zipcode.clone(),
            country: DEFAULT_COUNTRY.to_string(),
            phone: String::new(),
        }
    }
}
