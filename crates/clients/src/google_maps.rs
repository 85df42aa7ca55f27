//! Google Maps Places autocomplete and Geocoding.

use async_trait::async_trait;
use fulfillment::{AddressComponent, GeocodedAddress, GeocodingError, GeocodingProvider, Prediction};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::http::{base_url, build_client, endpoint};

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/";

/// Region bias for geocoding.
pub const GEOCODE_REGION: &str = "us";

const STATUS_OK: &str = "OK";
const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";

#[derive(Deserialize)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    predictions: Vec<Prediction>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

fn check_status(status: String, error_message: Option<String>) -> Result<(), GeocodingError> {
    if status == STATUS_OK || status == STATUS_ZERO_RESULTS {
        return Ok(());
    }
    Err(GeocodingError::Api {
        status,
        message: error_message.unwrap_or_default(),
    })
}

/// Geocoding provider backed by the Google Maps web services.
#[derive(Debug, Clone)]
pub struct GoogleMapsClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl GoogleMapsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
            base: base_url(base)?,
            api_key: api_key.into(),
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&str, &str)],
    ) -> Result<T, GeocodingError> {
        let response = self
            .client
            .get(endpoint(&self.base, segments))
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                if e.is_timeout() {
                    GeocodingError::Timeout
                } else {
                    GeocodingError::Transport(e.to_string())
                }
            })?;

        response
            .json::<T>()
            .await
            .map_err(|e| GeocodingError::Transport(e.to_string()))
    }
}

#[async_trait]
impl GeocodingProvider for GoogleMapsClient {
    #[tracing::instrument(skip(self))]
    async fn autocomplete(
        &self,
        text: &str,
        country: &str,
    ) -> Result<Vec<Prediction>, GeocodingError> {
        let components = format!("country:{}", country.to_lowercase());
        let response: AutocompleteResponse = self
            .query(
                &["place", "autocomplete", "json"],
                &[("input", text), ("components", &components)],
            )
            .await?;
        check_status(response.status, response.error_message)?;
        Ok(response.predictions)
    }

    #[tracing::instrument(skip(self))]
    async fn geocode(&self, text: &str) -> Result<Option<GeocodedAddress>, GeocodingError> {
        let response: GeocodeResponse = self
            .query(
                &["geocode", "json"],
                &[("address", text), ("region", GEOCODE_REGION)],
            )
            .await?;
        check_status(response.status, response.error_message)?;
        Ok(response
            .results
            .into_iter()
            .next()
            .map(|first| GeocodedAddress::from_components(&first.address_components)))
    }
}
