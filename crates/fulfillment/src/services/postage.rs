//! Postage provider trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{Money, PostalAddress, ShipmentId, Weight};
use serde::{Deserialize, Serialize};

use crate::error::PostageError;

/// Rate eligibility option for library mail.
pub const LIBRARY_MAIL_ELIGIBILITY: &str = "USPS.LIBRARYMAIL";

/// Predefined package type used for every parcel.
pub const PREDEFINED_PACKAGE: &str = "Parcel";

/// A parcel registered with the postage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: String,
    pub predefined_package: String,
    pub weight: Weight,
}

/// Options attached to a shipment at creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShipmentOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_rates_eligibility: Option<String>,
}

impl ShipmentOptions {
    /// Options that make library-mail rates eligible.
    pub fn library_mail() -> Self {
        Self {
            special_rates_eligibility: Some(LIBRARY_MAIL_ELIGIBILITY.to_string()),
        }
    }
}

/// A rate offered for a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub id: String,
    pub carrier: String,
    pub service: String,
    pub amount: Money,
}

/// A shipment as known to the postage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub parcel: Parcel,
    pub rates: Vec<Rate>,
    /// Set once the shipment is bought.
    pub selected_rate: Option<Rate>,
    pub tracking_code: Option<String>,
    pub tracking_url: Option<String>,
    /// URL of the label raster image.
    pub label_url: Option<String>,
}

/// Outcome of a refund request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub shipment_id: ShipmentId,
    pub status: String,
}

/// Picks the cheapest rate offered by any of `carriers` (case-insensitive).
pub fn lowest_rate(shipment: &Shipment, carriers: &[&str]) -> Result<Rate, PostageError> {
    shipment
        .rates
        .iter()
        .filter(|rate| carriers.iter().any(|c| rate.carrier.eq_ignore_ascii_case(c)))
        .min_by_key(|rate| rate.amount)
        .cloned()
        .ok_or_else(|| PostageError::NoRates {
            carriers: carriers.join(", "),
        })
}

/// Trait for postage purchase operations.
#[async_trait]
pub trait PostageProvider: Send + Sync {
    /// Verifies that an address is deliverable.
    async fn verify_address(&self, address: &PostalAddress) -> Result<(), PostageError>;

    /// Registers a parcel of the given weight.
    async fn create_parcel(&self, weight: Weight) -> Result<Parcel, PostageError>;

    /// Creates an unpaid shipment and collects its rates.
    async fn create_shipment(
        &self,
        from: &PostalAddress,
        to: &PostalAddress,
        parcel: &Parcel,
        options: &ShipmentOptions,
    ) -> Result<Shipment, PostageError>;

    /// Picks the cheapest rate among `carriers`.
    fn lowest_rate(&self, shipment: &Shipment, carriers: &[&str]) -> Result<Rate, PostageError> {
        lowest_rate(shipment, carriers)
    }

    /// Buys the shipment at the given rate. Money is spent once this returns Ok.
    async fn buy(&self, shipment: &Shipment, rate: &Rate) -> Result<Shipment, PostageError>;

    /// Requests a refund for a bought shipment.
    async fn refund(&self, shipment_id: &ShipmentId) -> Result<RefundResult, PostageError>;
}

#[derive(Debug)]
struct InMemoryPostageState {
    shipments: HashMap<ShipmentId, Shipment>,
    bought: Vec<ShipmentId>,
    refunds: Vec<ShipmentId>,
    offered: Vec<(String, String, Money)>,
    next_id: u32,
    fail_on_verify: bool,
    fail_on_buy: bool,
    fail_on_refund: bool,
    omit_label_url: bool,
}

impl Default for InMemoryPostageState {
    fn default() -> Self {
        Self {
            shipments: HashMap::new(),
            bought: Vec::new(),
            refunds: Vec::new(),
            offered: vec![
                ("USPS".into(), "Priority".into(), Money::from_cents(910)),
                ("USPS".into(), "LibraryMail".into(), Money::from_cents(480)),
                ("USPS".into(), "MediaMail".into(), Money::from_cents(512)),
                ("UPS".into(), "Ground".into(), Money::from_cents(390)),
            ],
            next_id: 0,
            fail_on_verify: false,
            fail_on_buy: false,
            fail_on_refund: false,
            omit_label_url: false,
        }
    }
}

/// In-memory postage provider for testing.
///
/// Shipments are numbered `shp_1`, `shp_2`, ...; the cheapest USPS rate is
/// library mail at $4.80.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPostageProvider {
    state: Arc<RwLock<InMemoryPostageState>>,
}

impl InMemoryPostageProvider {
    /// Creates a new in-memory postage provider.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryPostageState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryPostageState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the rates offered for every new shipment.
    pub fn set_rates(&self, rates: Vec<(&str, &str, Money)>) {
        self.write().offered = rates
            .into_iter()
            .map(|(carrier, service, amount)| (carrier.to_string(), service.to_string(), amount))
            .collect();
    }

    /// Configures the service to fail address verification.
    pub fn set_fail_on_verify(&self, fail: bool) {
        self.write().fail_on_verify = fail;
    }

    /// Configures the service to fail on buy calls.
    pub fn set_fail_on_buy(&self, fail: bool) {
        self.write().fail_on_buy = fail;
    }

    /// Configures the service to fail on refund calls.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write().fail_on_refund = fail;
    }

    /// Makes bought shipments come back without a label URL.
    pub fn set_omit_label_url(&self, omit: bool) {
        self.write().omit_label_url = omit;
    }

    /// Returns the ids of bought shipments, in purchase order.
    pub fn bought(&self) -> Vec<ShipmentId> {
        self.read().bought.clone()
    }

    /// Returns the ids passed to `refund`, in call order (including failed calls).
    pub fn refunds(&self) -> Vec<ShipmentId> {
        self.read().refunds.clone()
    }

    /// Returns the number of shipments created.
    pub fn shipment_count(&self) -> usize {
        self.read().shipments.len()
    }
}

#[async_trait]
impl PostageProvider for InMemoryPostageProvider {
    async fn verify_address(&self, address: &PostalAddress) -> Result<(), PostageError> {
        if self.read().fail_on_verify {
            return Err(PostageError::AddressRejected(format!(
                "cannot verify {}",
                address.street1
            )));
        }
        Ok(())
    }

    async fn create_parcel(&self, weight: Weight) -> Result<Parcel, PostageError> {
        let mut state = self.write();
        state.next_id += 1;
        Ok(Parcel {
            id: format!("prcl_{}", state.next_id),
            predefined_package: PREDEFINED_PACKAGE.to_string(),
            weight,
        })
    }

    async fn create_shipment(
        &self,
        _from: &PostalAddress,
        _to: &PostalAddress,
        parcel: &Parcel,
        options: &ShipmentOptions,
    ) -> Result<Shipment, PostageError> {
        let mut state = self.write();
        let number = state.shipments.len() + 1;
        let library_mail = options.special_rates_eligibility.as_deref()
            == Some(LIBRARY_MAIL_ELIGIBILITY);
        let rates = state
            .offered
            .iter()
            .filter(|(_, service, _)| library_mail || service != "LibraryMail")
            .enumerate()
            .map(|(i, (carrier, service, amount))| Rate {
                id: format!("rate_{number}_{i}"),
                carrier: carrier.clone(),
                service: service.clone(),
                amount: *amount,
            })
            .collect();

        let shipment = Shipment {
            id: ShipmentId::new(format!("shp_{number}")),
            parcel: parcel.clone(),
            rates,
            selected_rate: None,
            tracking_code: None,
            tracking_url: None,
            label_url: None,
        };
        state.shipments.insert(shipment.id.clone(), shipment.clone());
        Ok(shipment)
    }

    async fn buy(&self, shipment: &Shipment, rate: &Rate) -> Result<Shipment, PostageError> {
        let mut state = self.write();

        if state.fail_on_buy {
            return Err(PostageError::Unavailable("Payment declined".to_string()));
        }
        if !shipment.rates.iter().any(|r| r.id == rate.id) {
            return Err(PostageError::Rejected {
                status: 422,
                message: format!("rate {} does not belong to {}", rate.id, shipment.id),
            });
        }

        let number = state.bought.len() + 1;
        let tracking_code = format!("TRACK-{number:04}");
        let mut bought = shipment.clone();
        bought.selected_rate = Some(rate.clone());
        bought.tracking_url = Some(format!("https://track.example/{tracking_code}"));
        bought.tracking_code = Some(tracking_code);
        if !state.omit_label_url {
            bought.label_url = Some(format!("https://labels.example/{}.png", shipment.id));
        }

        state.bought.push(bought.id.clone());
        state.shipments.insert(bought.id.clone(), bought.clone());
        Ok(bought)
    }

    async fn refund(&self, shipment_id: &ShipmentId) -> Result<RefundResult, PostageError> {
        let mut state = self.write();
        state.refunds.push(shipment_id.clone());

        if state.fail_on_refund {
            return Err(PostageError::Transport("refund endpoint timed out".to_string()));
        }
        if !state.bought.contains(shipment_id) {
            return Err(PostageError::Rejected {
                status: 404,
                message: format!("shipment {shipment_id} was not bought"),
            });
        }
        Ok(RefundResult {
            shipment_id: shipment_id.clone(),
            status: "submitted".to_string(),
        })
    }
}
