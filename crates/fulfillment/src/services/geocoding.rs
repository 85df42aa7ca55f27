//! Geocoding provider trait and in-memory implementation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Address, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::GeocodingError;

/// One autocomplete prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub description: String,
    #[serde(default)]
    pub place_id: String,
}

impl Prediction {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            place_id: String::new(),
        }
    }
}

/// One component of a geocoded address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    pub types: Vec<String>,
}

impl AddressComponent {
    pub fn new(long_name: &str, short_name: &str, types: &[&str]) -> Self {
        Self {
            long_name: long_name.to_string(),
            short_name: short_name.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn has_type(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t == kind)
    }
}

/// A structured address returned by geocoding, without an addressee.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub street1: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: Option<String>,
}

impl GeocodedAddress {
    /// Builds an address from geocoder components.
    ///
    /// `street_number` and `route` join into the first street line; the state
    /// uses its short name.
    pub fn from_components(components: &[AddressComponent]) -> Self {
        let mut address = GeocodedAddress::default();
        let mut street_number = None;
        let mut route = None;

        for component in components {
            if component.has_type("street_number") {
                street_number = Some(component.long_name.as_str());
            } else if component.has_type("route") {
                route = Some(component.long_name.as_str());
            } else if component.has_type("locality") {
                address.city = component.long_name.clone();
            } else if component.has_type("administrative_area_level_1") {
                address.state = component.short_name.clone();
            } else if component.has_type("postal_code") {
                address.zipcode = component.long_name.clone();
            } else if component.has_type("country") {
                address.country = Some(component.short_name.clone());
            }
        }

        address.street1 = match (street_number, route) {
            (Some(number), Some(route)) => format!("{number} {route}"),
            (Some(number), None) => number.to_string(),
            (None, Some(route)) => route.to_string(),
            (None, None) => String::new(),
        };
        address
    }

    /// Attaches an addressee and validates the result.
    pub fn into_address(self, name: impl Into<String>) -> Result<Address, ValidationError> {
        let address = Address::new(name, self.street1, self.city, self.state, self.zipcode);
        address.validate()?;
        Ok(address)
    }
}

/// Trait for geocoding operations used by interactive address entry.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Returns predictions for partial text, restricted to one country.
    async fn autocomplete(
        &self,
        text: &str,
        country: &str,
    ) -> Result<Vec<Prediction>, GeocodingError>;

    /// Resolves full address text to a structured address, if it exists.
    async fn geocode(&self, text: &str) -> Result<Option<GeocodedAddress>, GeocodingError>;
}

#[derive(Debug, Default)]
struct InMemoryGeocodingState {
    addresses: Vec<(String, GeocodedAddress)>,
    fail: bool,
    latency: Option<Duration>,
}

/// In-memory geocoding provider for testing.
///
/// Autocomplete returns every known address whose text contains the query,
/// ignoring case, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGeocodingProvider {
    state: Arc<RwLock<InMemoryGeocodingState>>,
    autocomplete_calls: Arc<AtomicUsize>,
}

impl InMemoryGeocodingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryGeocodingState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryGeocodingState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds an address that can be completed and geocoded.
    pub fn with_address(self, text: impl Into<String>, address: GeocodedAddress) -> Self {
        self.write().addresses.push((text.into(), address));
        self
    }

    /// Makes every call fail with a transport error.
    pub fn set_fail(&self, fail: bool) {
        self.write().fail = fail;
    }

    /// Delays every autocomplete response.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = Some(latency);
    }

    /// Returns the number of autocomplete requests received.
    pub fn autocomplete_calls(&self) -> usize {
        self.autocomplete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeocodingProvider for InMemoryGeocodingProvider {
    async fn autocomplete(
        &self,
        text: &str,
        _country: &str,
    ) -> Result<Vec<Prediction>, GeocodingError> {
        self.autocomplete_calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.read().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.read();
        if state.fail {
            return Err(GeocodingError::Transport("connection reset".to_string()));
        }
        let needle = text.to_lowercase();
        Ok(state
            .addresses
            .iter()
            .filter(|(known, _)| known.to_lowercase().contains(&needle))
            .map(|(known, _)| Prediction::new(known.clone()))
            .collect())
    }

    async fn geocode(&self, text: &str) -> Result<Option<GeocodedAddress>, GeocodingError> {
        let state = self.read();
        if state.fail {
            return Err(GeocodingError::Timeout);
        }
        Ok(state
            .addresses
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(text.trim()))
            .map(|(_, address)| address.clone()))
    }
}
