//! EasyPost postage provider.

use async_trait::async_trait;
use common::{Money, PostalAddress, ShipmentId, Weight};
use fulfillment::{
    Parcel, PostageError, PostageProvider, Rate, RefundResult, Shipment, ShipmentOptions,
};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::http::{base_url, build_client, endpoint};

pub const DEFAULT_BASE_URL: &str = "https://api.easypost.com/v2/";

#[derive(Serialize)]
struct AddressEnvelope<'a> {
    address: &'a PostalAddress,
}

#[derive(Serialize)]
struct ParcelEnvelope<'a> {
    parcel: ParcelRequest<'a>,
}

#[derive(Serialize)]
struct ParcelRequest<'a> {
    predefined_package: &'a str,
    /// Ounces.
    weight: u32,
}

#[derive(Serialize)]
struct ShipmentEnvelope<'a> {
    shipment: ShipmentRequest<'a>,
}

#[derive(Serialize)]
struct ShipmentRequest<'a> {
    from_address: &'a PostalAddress,
    to_address: &'a PostalAddress,
    parcel: IdRef<'a>,
    options: &'a ShipmentOptions,
}

#[derive(Serialize)]
struct BuyRequest<'a> {
    rate: IdRef<'a>,
}

#[derive(Serialize)]
struct IdRef<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct WireParcel {
    id: String,
    #[serde(default)]
    predefined_package: Option<String>,
    weight: f64,
}

#[derive(Deserialize)]
struct WireRate {
    id: String,
    carrier: String,
    service: String,
    /// Decimal dollars, e.g. `"4.80"`.
    rate: String,
}

#[derive(Deserialize)]
struct WireTracker {
    public_url: Option<String>,
}

#[derive(Deserialize)]
struct WirePostageLabel {
    label_url: Option<String>,
}

#[derive(Deserialize)]
struct WireShipment {
    id: String,
    parcel: WireParcel,
    #[serde(default)]
    rates: Vec<WireRate>,
    selected_rate: Option<WireRate>,
    tracking_code: Option<String>,
    tracker: Option<WireTracker>,
    postage_label: Option<WirePostageLabel>,
    refund_status: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: WireError,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

impl TryFrom<WireParcel> for Parcel {
    type Error = PostageError;

    fn try_from(wire: WireParcel) -> Result<Self, Self::Error> {
        let weight = Weight::from_ounces(wire.weight.round() as i64)
            .map_err(|e| PostageError::InvalidResponse(format!("parcel {}: {e}", wire.id)))?;
        Ok(Parcel {
            id: wire.id,
            predefined_package: wire.predefined_package.unwrap_or_default(),
            weight,
        })
    }
}

impl TryFrom<WireRate> for Rate {
    type Error = PostageError;

    fn try_from(wire: WireRate) -> Result<Self, Self::Error> {
        let amount = Money::parse_decimal(&wire.rate)
            .map_err(|e| PostageError::InvalidResponse(format!("rate {}: {e}", wire.id)))?;
        Ok(Rate {
            id: wire.id,
            carrier: wire.carrier,
            service: wire.service,
            amount,
        })
    }
}

impl TryFrom<WireShipment> for Shipment {
    type Error = PostageError;

    fn try_from(wire: WireShipment) -> Result<Self, Self::Error> {
        Ok(Shipment {
            id: ShipmentId::new(wire.id),
            parcel: wire.parcel.try_into()?,
            rates: wire
                .rates
                .into_iter()
                .map(Rate::try_from)
                .collect::<Result<_, _>>()?,
            selected_rate: wire.selected_rate.map(Rate::try_from).transpose()?,
            tracking_code: wire.tracking_code,
            tracking_url: wire.tracker.and_then(|t| t.public_url),
            label_url: wire.postage_label.and_then(|l| l.label_url),
        })
    }
}

/// Postage provider backed by the EasyPost REST API.
///
/// Authenticates with the API key as the basic-auth user name.
#[derive(Debug, Clone)]
pub struct EasyPostClient {
    client: Client,
    base: Url,
    api_key: String,
}

impl EasyPostClient {
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

    fn post(&self, segments: &[&str]) -> RequestBuilder {
        self.client
            .post(endpoint(&self.base, segments))
            .basic_auth(&self.api_key, Some(""))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PostageError> {
        let response = request
            .send()
            .await
            .map_err(|e| PostageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(PostageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PostageError::InvalidResponse(e.to_string()))
    }

    async fn send_shipment(
        &self,
        request: RequestBuilder,
    ) -> Result<Shipment, PostageError> {
        self.send::<WireShipment>(request).await?.try_into()
    }
}

#[async_trait]
impl PostageProvider for EasyPostClient {
    #[tracing::instrument(skip(self, address), fields(zip = %address.zip))]
    async fn verify_address(&self, address: &PostalAddress) -> Result<(), PostageError> {
        let request = self
            .post(&["addresses", "create_and_verify"])
            .json(&AddressEnvelope { address });
        match self.send::<serde_json::Value>(request).await {
            Ok(_) => Ok(()),
            Err(PostageError::Rejected { message, .. }) => {
                Err(PostageError::AddressRejected(message))
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn create_parcel(&self, weight: Weight) -> Result<Parcel, PostageError> {
        let request = self.post(&["parcels"]).json(&ParcelEnvelope {
            parcel: ParcelRequest {
                predefined_package: fulfillment::services::postage::PREDEFINED_PACKAGE,
                weight: weight.ounces(),
            },
        });
        self.send::<WireParcel>(request).await?.try_into()
    }

    #[tracing::instrument(skip(self, from, to, options), fields(parcel = %parcel.id))]
    async fn create_shipment(
        &self,
        from: &PostalAddress,
        to: &PostalAddress,
        parcel: &Parcel,
        options: &ShipmentOptions,
    ) -> Result<Shipment, PostageError> {
        let request = self.post(&["shipments"]).json(&ShipmentEnvelope {
            shipment: ShipmentRequest {
                from_address: from,
                to_address: to,
                parcel: IdRef { id: &parcel.id },
                options,
            },
        });
        self.send_shipment(request).await
    }

    #[tracing::instrument(
        skip(self, shipment),
        fields(shipment_id = %shipment.id, rate = %rate.amount)
    )]
    async fn buy(
        &self,
        shipment: &Shipment,
        rate: &Rate,
    ) -> Result<Shipment, PostageError> {
        let request = self
            .post(&["shipments", shipment.id.as_str(), "buy"])
            .json(&BuyRequest {
                rate: IdRef { id: &rate.id },
            });
        self.send_shipment(request).await
    }

    #[tracing::instrument(skip(self))]
    async fn refund(
        &self,
        shipment_id: &ShipmentId,
    ) -> Result<RefundResult, PostageError> {
        let request = self.post(&["shipments", shipment_id.as_str(), "refund"]);
        let wire = self.send::<WireShipment>(request).await?;
        Ok(RefundResult {
            shipment_id: ShipmentId::new(wire.id),
            status: wire.refund_status.unwrap_or_else(|| "submitted".to_string()),
        })
    }
}
