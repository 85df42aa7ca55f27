//! Saga journal events.

use chrono::{DateTime, Utc};
use common::{Money, SagaId, ShipmentId};
use serde::{Deserialize, Serialize};

/// Events recorded while a fulfillment saga runs.
///
/// The journal lives in memory for the duration of one saga; it is an audit
/// trail, not a persistence mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// Both addresses validated.
    AddressReady(AddressReadyData),

    /// A saga step started execution.
    StepStarted(StepData),

    /// A saga step completed successfully.
    StepCompleted(StepData),

    /// A saga step failed.
    StepFailed(StepFailedData),

    /// Postage was bought; from here on failures are compensated.
    PostagePurchased(PostagePurchasedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    /// A compensation step completed successfully.
    CompensationStepCompleted(StepData),

    /// A compensation step failed.
    CompensationStepFailed(StepFailedData),

    /// Saga completed successfully.
    SagaCompleted(SagaCompletedData),

    /// Saga failed.
    SagaFailed(SagaFailedData),
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::AddressReady(_) => "AddressReady",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::PostagePurchased(_) => "PostagePurchased",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationStepCompleted(_) => "CompensationStepCompleted",
            SagaEvent::CompensationStepFailed(_) => "CompensationStepFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

/// Data for SagaStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    /// The saga instance ID.
    pub saga_id: SagaId,
    /// The type of saga.
    pub saga_type: String,
    /// Parcel weight in ounces.
    pub weight_ounces: u32,
    /// Whether the shipment will be registered with the fulfillment server.
    pub registered: bool,
    /// When the saga started.
    pub started_at: DateTime<Utc>,
}

/// Data for AddressReady event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressReadyData {
    /// Whether the postage provider verified the destination.
    pub verified: bool,
}

/// Data for step started/completed events (just the step name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    /// The step name.
    pub step_name: String,
}

/// Data for StepFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    /// The step that failed.
    pub step_name: String,
    /// Error message describing the failure.
    pub error: String,
}

/// Data for PostagePurchased event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostagePurchasedData {
    /// Provider shipment id.
    pub shipment_id: ShipmentId,
    /// Amount charged.
    pub rate: Money,
    /// Carrier and service of the selected rate.
    pub carrier: String,
    pub service: String,
    /// Carrier tracking code, if assigned at purchase.
    pub tracking_code: Option<String>,
}

/// Data for CompensationStarted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

/// Data for SagaCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaCompletedData {
    /// When the saga completed.
    pub completed_at: DateTime<Utc>,
}

/// Data for SagaFailed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaFailedData {
    /// Reason for failure.
    pub reason: String,
    /// Whether the purchased postage was refunded (false if nothing was bought).
    pub refunded: bool,
    /// When the saga failed.
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    /// Creates a SagaStarted event.
    pub fn saga_started(
        saga_id: SagaId,
        saga_type: impl Into<String>,
        weight_ounces: u32,
        registered: bool,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            saga_type: saga_type.into(),
            weight_ounces,
            registered,
            started_at: Utc::now(),
        })
    }

    /// Creates an AddressReady event.
    pub fn address_ready(verified: bool) -> Self {
        SagaEvent::AddressReady(AddressReadyData { verified })
    }

    /// Creates a StepStarted event.
    pub fn step_started(step_name: impl Into<String>) -> Self {
        SagaEvent::StepStarted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a StepCompleted event.
    pub fn step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::StepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a StepFailed event.
    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a PostagePurchased event.
    pub fn postage_purchased(
        shipment_id: ShipmentId,
        rate: Money,
        carrier: impl Into<String>,
        service: impl Into<String>,
        tracking_code: Option<String>,
    ) -> Self {
        SagaEvent::PostagePurchased(PostagePurchasedData {
            shipment_id,
            rate,
            carrier: carrier.into(),
            service: service.into(),
            tracking_code,
        })
    }

    /// Creates a CompensationStarted event.
    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    /// Creates a CompensationStepCompleted event.
    pub fn compensation_step_completed(step_name: impl Into<String>) -> Self {
        SagaEvent::CompensationStepCompleted(StepData {
            step_name: step_name.into(),
        })
    }

    /// Creates a CompensationStepFailed event.
    pub fn compensation_step_failed(
        step_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        SagaEvent::CompensationStepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    /// Creates a SagaCompleted event.
    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    /// Creates a SagaFailed event.
    pub fn saga_failed(reason: impl Into<String>, refunded: bool) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            refunded,
            failed_at: Utc::now(),
        })
    }
}
