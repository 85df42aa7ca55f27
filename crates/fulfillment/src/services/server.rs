//! Fulfillment server trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::{Address, Jurisdiction, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::error::{SagaError, ServerError};
use crate::services::postage::Shipment;
use crate::steps;

/// A correctional unit known to the fulfillment server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub jurisdiction: Jurisdiction,
    pub name: String,
}

impl Unit {
    /// Creates a unit, upper-casing its name.
    pub fn new(jurisdiction: Jurisdiction, name: impl AsRef<str>) -> Self {
        Self {
            jurisdiction,
            name: name.as_ref().trim().to_uppercase(),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.jurisdiction.code())
    }
}

/// An inmate record as returned by the fulfillment server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InmateRecord {
    pub jurisdiction: Jurisdiction,
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    /// Name of the unit the inmate is housed in.
    pub unit: String,
}

impl InmateRecord {
    /// Addressee line printed on the label: `First Last #id`.
    pub fn addressee(&self) -> String {
        format!(
            "{} {} #{}",
            self.first_name,
            self.last_name,
            self.jurisdiction.format_inmate_id(self.id)
        )
    }
}

/// The subset of a bought shipment the fulfillment server records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentSummary {
    pub shipment_id: ShipmentId,
    /// Postage paid, in cents.
    pub postage: i64,
    /// Parcel weight, in ounces.
    pub weight: u32,
    pub tracking_code: String,
    pub tracking_url: String,
}

impl ShipmentSummary {
    /// Extracts the summary from a bought shipment.
    pub fn from_shipment(shipment: &Shipment) -> Result<Self, SagaError> {
        let missing = |field| SagaError::IncompleteShipment {
            step: steps::STEP_REGISTER_SHIPMENT,
            shipment_id: shipment.id.clone(),
            field,
        };
        let rate = shipment
            .selected_rate
            .as_ref()
            .ok_or_else(|| missing("selected rate"))?;
        let tracking_code = shipment
            .tracking_code
            .clone()
            .ok_or_else(|| missing("tracking code"))?;
        let tracking_url = shipment
            .tracking_url
            .clone()
            .ok_or_else(|| missing("tracking url"))?;

        Ok(Self {
            shipment_id: shipment.id.clone(),
            postage: rate.amount.cents(),
            weight: shipment.parcel.weight.ounces(),
            tracking_code,
            tracking_url,
        })
    }
}

/// What a registered shipment is recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistrationTarget {
    /// Bulk shipment to a unit's mailroom.
    Unit {
        jurisdiction: Jurisdiction,
        name: String,
    },
    /// Individual shipment to an inmate.
    Inmate {
        jurisdiction: Jurisdiction,
        inmate_id: u64,
    },
    /// Individual shipment filed against a legacy request.
    LegacyRequest { request_id: u64 },
}

impl RegistrationTarget {
    /// Target for a unit shipment.
    pub fn unit(unit: &Unit) -> Self {
        RegistrationTarget::Unit {
            jurisdiction: unit.jurisdiction,
            name: unit.name.clone(),
        }
    }
}

impl std::fmt::Display for RegistrationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationTarget::Unit { jurisdiction, name } => {
                write!(f, "unit {jurisdiction}/{name}")
            }
            RegistrationTarget::Inmate {
                jurisdiction,
                inmate_id,
            } => write!(f, "inmate {jurisdiction}-{inmate_id}"),
            RegistrationTarget::LegacyRequest { request_id } => {
                write!(f, "legacy request {request_id}")
            }
        }
    }
}

/// Trait for fulfillment server operations.
///
/// Lookups report a miss as [`ServerError::NotFound`]; only
/// [`ServerError::Connectivity`] is fatal.
#[async_trait]
pub trait FulfillmentServer: Send + Sync {
    /// Lists every unit.
    async fn list_units(&self) -> Result<Vec<Unit>, ServerError>;

    /// Returns the mailroom address of a unit.
    async fn get_unit_address(
        &self,
        jurisdiction: Jurisdiction,
        name: &str,
    ) -> Result<Address, ServerError>;

    /// Looks up an inmate in one jurisdiction.
    async fn get_inmate(
        &self,
        jurisdiction: Jurisdiction,
        id: u64,
    ) -> Result<InmateRecord, ServerError>;

    /// Looks up the inmate a legacy request was filed for.
    async fn get_inmate_by_legacy_request(
        &self,
        request_id: u64,
    ) -> Result<InmateRecord, ServerError>;

    /// Returns the sender address printed on every label.
    async fn get_return_address(&self) -> Result<Address, ServerError>;

    /// Records a bought shipment against its target.
    async fn register_shipment(
        &self,
        summary: &ShipmentSummary,
        target: &RegistrationTarget,
    ) -> Result<(), ServerError>;
}

#[derive(Debug)]
struct InMemoryServerState {
    units: HashMap<Unit, Address>,
    inmates: HashMap<(Jurisdiction, u64), InmateRecord>,
    legacy_requests: HashMap<u64, (Jurisdiction, u64)>,
    return_address: Address,
    registrations: Vec<(ShipmentSummary, RegistrationTarget)>,
    lookups: Vec<String>,
    fail_on_register: bool,
    offline: bool,
}

impl Default for InMemoryServerState {
    fn default() -> Self {
        Self {
            units: HashMap::new(),
            inmates: HashMap::new(),
            legacy_requests: HashMap::new(),
            return_address: Address::new(
                "Inside Books Project",
                "827 West 12th St",
                "Austin",
                "TX",
                "78701",
            ),
            registrations: Vec::new(),
            lookups: Vec::new(),
            fail_on_register: false,
            offline: false,
        }
    }
}

/// In-memory fulfillment server for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFulfillmentServer {
    state: Arc<RwLock<InMemoryServerState>>,
}

impl InMemoryFulfillmentServer {
    /// Creates an empty in-memory server.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryServerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryServerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a unit with its mailroom address.
    pub fn with_unit(self, unit: Unit, address: Address) -> Self {
        self.write().units.insert(unit, address);
        self
    }

    /// Adds an inmate record.
    pub fn with_inmate(self, record: InmateRecord) -> Self {
        self.write()
            .inmates
            .insert((record.jurisdiction, record.id), record);
        self
    }

    /// Links a legacy request id to an existing inmate.
    pub fn with_legacy_request(self, request_id: u64, jurisdiction: Jurisdiction, id: u64) -> Self {
        self.write()
            .legacy_requests
            .insert(request_id, (jurisdiction, id));
        self
    }

    /// Replaces the return address.
    pub fn with_return_address(self, address: Address) -> Self {
        self.write().return_address = address;
        self
    }

    /// Configures the server to reject registrations.
    pub fn set_fail_on_register(&self, fail: bool) {
        self.write().fail_on_register = fail;
    }

    /// Makes every call fail with a connectivity error.
    pub fn set_offline(&self, offline: bool) {
        self.write().offline = offline;
    }

    /// Returns every registration, in call order.
    pub fn registrations(&self) -> Vec<(ShipmentSummary, RegistrationTarget)> {
        self.read().registrations.clone()
    }

    /// Returns the inmate lookups performed, as `TEX-123` or `request-123`.
    pub fn lookups(&self) -> Vec<String> {
        self.read().lookups.clone()
    }

    fn check_online(&self) -> Result<(), ServerError> {
        if self.read().offline {
            return Err(ServerError::Connectivity("connection refused".to_string()));
        }
        Ok(())
    }

    fn find_inmate(
        state: &InMemoryServerState,
        jurisdiction: Jurisdiction,
        id: u64,
    ) -> Result<InmateRecord, ServerError> {
        state
            .inmates
            .get(&(jurisdiction, id))
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("inmate {jurisdiction}-{id}")))
    }
}

#[async_trait]
impl FulfillmentServer for InMemoryFulfillmentServer {
    async fn list_units(&self) -> Result<Vec<Unit>, ServerError> {
        self.check_online()?;
        let mut units: Vec<Unit> = self.read().units.keys().cloned().collect();
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }

    async fn get_unit_address(
        &self,
        jurisdiction: Jurisdiction,
        name: &str,
    ) -> Result<Address, ServerError> {
        self.check_online()?;
        let unit = Unit::new(jurisdiction, name);
        self.read()
            .units
            .get(&unit)
            .cloned()
            .ok_or_else(|| ServerError::NotFound(format!("unit {jurisdiction}/{}", unit.name)))
    }

    async fn get_inmate(
        &self,
        jurisdiction: Jurisdiction,
        id: u64,
    ) -> Result<InmateRecord, ServerError> {
        self.check_online()?;
        let mut state = self.write();
        state.lookups.push(format!("{}-{id}", jurisdiction.code()));
        Self::find_inmate(&state, jurisdiction, id)
    }

    async fn get_inmate_by_legacy_request(
        &self,
        request_id: u64,
    ) -> Result<InmateRecord, ServerError> {
        self.check_online()?;
        let mut state = self.write();
        state.lookups.push(format!("request-{request_id}"));
        let (jurisdiction, id) = state
            .legacy_requests
            .get(&request_id)
            .copied()
            .ok_or_else(|| ServerError::NotFound(format!("request {request_id}")))?;
        Self::find_inmate(&state, jurisdiction, id)
    }

    async fn get_return_address(&self) -> Result<Address, ServerError> {
        self.check_online()?;
        Ok(self.read().return_address.clone())
    }

    async fn register_shipment(
        &self,
        summary: &ShipmentSummary,
        target: &RegistrationTarget,
    ) -> Result<(), ServerError> {
        self.check_online()?;
        let mut state = self.write();
        if state.fail_on_register {
            return Err(ServerError::Rejected {
                status: 500,
                message: "shipment ledger unavailable".to_string(),
            });
        }
        state.registrations.push((summary.clone(), target.clone()));
        Ok(())
    }
}
