//! Fulfillment server REST client.
//!
//! Paths, relative to the configured base URL:
//!
//! | call | request |
//! |------|---------|
//! | list units | `GET units` |
//! | unit address | `GET unit/{jurisdiction}/{name}/address` |
//! | inmate | `GET inmate/{jurisdiction}/{id}` |
//! | legacy request | `GET request/{id}/inmate` |
//! | return address | `GET config` |
//! | register for a unit | `POST unit/{jurisdiction}/{name}/ship` |
//! | register for an inmate | `POST inmate/{jurisdiction}/{id}/ship` |
//! | register for a request | `POST request/{id}/ship` |

use async_trait::async_trait;
use common::{Address, Jurisdiction};
use fulfillment::{
    FulfillmentServer, InmateRecord, RegistrationTarget, ServerError, ShipmentSummary, Unit,
};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::http::{base_url, build_client, endpoint};

/// Header carrying the server API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Deserialize)]
struct UnitList {
    units: Vec<Unit>,
}

#[derive(Deserialize)]
struct ServerConfig {
    address: Address,
}

/// Fulfillment server reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFulfillmentServer {
    client: Client,
    base: Url,
    api_key: String,
}

impl HttpFulfillmentServer {
    pub fn new(base: &str, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client()?,
            base: base_url(base)?,
            api_key: api_key.into(),
        })
    }

    fn get(&self, segments: &[&str]) -> RequestBuilder {
        self.client
            .get(endpoint(&self.base, segments))
            .header(API_KEY_HEADER, &self.api_key)
    }

    fn post(&self, segments: &[&str]) -> RequestBuilder {
        self.client
            .post(endpoint(&self.base, segments))
            .header(API_KEY_HEADER, &self.api_key)
    }

    async fn send(
        &self,
        what: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, ServerError> {
        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ServerError::Connectivity(e.to_string())
            } else {
                ServerError::InvalidResponse(e.to_string())
            }
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(ServerError::NotFound(what.to_string())),
            status => Err(ServerError::Rejected {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        what: &str,
        segments: &[&str],
    ) -> Result<T, ServerError> {
        self.send(what, self.get(segments))
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServerError::InvalidResponse(format!("{what}: {e}")))
    }
}

#[async_trait]
impl FulfillmentServer for HttpFulfillmentServer {
    #[tracing::instrument(skip(self))]
    async fn list_units(&self) -> Result<Vec<Unit>, ServerError> {
        let list: UnitList = self.fetch("units", &["units"]).await?;
        Ok(list.units)
    }

    #[tracing::instrument(skip(self))]
    async fn get_unit_address(
        &self,
        jurisdiction: Jurisdiction,
        name: &str,
    ) -> Result<Address, ServerError> {
        let what = format!("unit {jurisdiction}/{name}");
        self.fetch(&what, &["unit", jurisdiction.code(), name, "address"])
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_inmate(
        &self,
        jurisdiction: Jurisdiction,
        id: u64,
    ) -> Result<InmateRecord, ServerError> {
        let what = format!("inmate {jurisdiction}-{id}");
        self.fetch(&what, &["inmate", jurisdiction.code(), &id.to_string()])
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_inmate_by_legacy_request(
        &self,
        request_id: u64,
    ) -> Result<InmateRecord, ServerError> {
        let what = format!("request {request_id}");
        self.fetch(&what, &["request", &request_id.to_string(), "inmate"])
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_return_address(&self) -> Result<Address, ServerError> {
        let config: ServerConfig = self.fetch("config", &["config"]).await?;
        Ok(config.address)
    }

    #[tracing::instrument(skip(self, summary), fields(shipment_id = %summary.shipment_id))]
    async fn register_shipment(
        &self,
        summary: &ShipmentSummary,
        target: &RegistrationTarget,
    ) -> Result<(), ServerError> {
        let request = match target {
            RegistrationTarget::Unit { jurisdiction, name } => {
                self.post(&["unit", jurisdiction.code(), name, "ship"])
            }
            RegistrationTarget::Inmate {
                jurisdiction,
                inmate_id,
            } => self.post(&["inmate", jurisdiction.code(), &inmate_id.to_string(), "ship"]),
            RegistrationTarget::LegacyRequest { request_id } => {
                self.post(&["request", &request_id.to_string(), "ship"])
            }
        };
        self.send(&target.to_string(), request.json(summary))
            .await?;
        Ok(())
    }
}
