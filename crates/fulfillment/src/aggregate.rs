//! Saga instance built from its journal.

use common::{Money, SagaId, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::events::SagaEvent;
use crate::state::SagaState;
use crate::steps;

/// One run of the fulfillment saga.
///
/// State is derived by applying [`SagaEvent`]s in order; the applied events
/// are kept as the run's journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaInstance {
    id: Option<SagaId>,
    saga_type: String,
    state: SagaState,
    weight_ounces: u32,
    address_verified: bool,
    current_step: Option<String>,
    completed_steps: Vec<String>,
    /// Shipment bought from the postage provider.
    shipment_id: Option<ShipmentId>,
    /// Amount charged for the shipment.
    rate: Option<Money>,
    tracking_code: Option<String>,
    refunded: bool,
    /// Reason for failure, if any.
    failure_reason: Option<String>,
    journal: Vec<SagaEvent>,
}

impl SagaInstance {
    /// Applies an event, updating state and appending it to the journal.
    pub fn apply(&mut self, event: SagaEvent) {
        match &event {
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.saga_type = data.saga_type.clone();
                self.weight_ounces = data.weight_ounces;
                self.state = SagaState::Start;
            }
            SagaEvent::AddressReady(data) => {
                self.address_verified = data.verified;
                self.state = SagaState::AddressReady;
            }
            SagaEvent::StepStarted(data) => {
                self.current_step = Some(data.step_name.clone());
            }
            SagaEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step_name.clone());
                if data.step_name == steps::STEP_REGISTER_SHIPMENT {
                    self.state = SagaState::Registered;
                }
            }
            SagaEvent::StepFailed(data) => {
                self.failure_reason = Some(data.error.clone());
            }
            SagaEvent::PostagePurchased(data) => {
                self.shipment_id = Some(data.shipment_id.clone());
                self.rate = Some(data.rate);
                self.tracking_code = data.tracking_code.clone();
                self.state = SagaState::PostagePurchased;
            }
            SagaEvent::CompensationStarted(_) => {
                self.state = SagaState::Refunding;
            }
            SagaEvent::CompensationStepCompleted(data) => {
                if data.step_name == steps::STEP_REFUND_POSTAGE {
                    self.refunded = true;
                }
            }
            SagaEvent::CompensationStepFailed(_) => {
                // Refund failure surfaces through SagaFailed and the returned error
            }
            SagaEvent::SagaCompleted(_) => {
                self.current_step = None;
                self.state = SagaState::LabelPrinted;
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason.clone());
            }
        }
        self.journal.push(event);
    }
}

// Query methods
impl SagaInstance {
    /// Returns the saga ID.
    pub fn id(&self) -> Option<SagaId> {
        self.id
    }

    /// Returns the saga state.
    pub fn state(&self) -> SagaState {
        self.state
    }

    /// Returns the saga type.
    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    /// Returns the parcel weight in ounces.
    pub fn weight_ounces(&self) -> u32 {
        self.weight_ounces
    }

    /// Returns whether the destination address was verified by the provider.
    pub fn address_verified(&self) -> bool {
        self.address_verified
    }

    /// Returns the step currently executing, if any.
    pub fn current_step(&self) -> Option<&str> {
        self.current_step.as_deref()
    }

    /// Returns the list of completed step names.
    pub fn completed_steps(&self) -> &[String] {
        &self.completed_steps
    }

    /// Returns the purchased shipment ID, if postage was bought.
    pub fn shipment_id(&self) -> Option<&ShipmentId> {
        self.shipment_id.as_ref()
    }

    /// Returns the amount charged, if postage was bought.
    pub fn rate(&self) -> Option<Money> {
        self.rate
    }

    /// Returns the tracking code, if set.
    pub fn tracking_code(&self) -> Option<&str> {
        self.tracking_code.as_deref()
    }

    /// Returns true if purchased postage was refunded.
    pub fn refunded(&self) -> bool {
        self.refunded
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns every event applied so far, in order.
    pub fn journal(&self) -> &[SagaEvent] {
        &self.journal
    }
}
