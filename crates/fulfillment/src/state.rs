//! Saga state machine.

use serde::{Deserialize, Serialize};

/// The state of a fulfillment saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Start ──► AddressReady ──► PostagePurchased ──► Registered ──► LabelPrinted
///   │            │                  │                 │
///   │            │                  └──► Refunding ◄──┘
///   │            │                          │
///   └────────────┴────────────────────► Failed
/// ```
///
/// Manual shipments skip `Registered`. Once postage is purchased every
/// failure goes through `Refunding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaState {
    /// Saga has not validated its input yet.
    #[default]
    Start,

    /// Addresses validated; nothing purchased.
    AddressReady,

    /// Postage bought; compensation is now mandatory on failure.
    PostagePurchased,

    /// Shipment registered with the fulfillment server.
    Registered,

    /// Label printed (terminal success).
    LabelPrinted,

    /// A step failed after purchase and the refund is in progress.
    Refunding,

    /// Saga failed (terminal state).
    Failed,
}

impl SagaState {
    /// Returns true if postage may be purchased from this state.
    pub fn can_purchase(&self) -> bool {
        matches!(self, SagaState::AddressReady)
    }

    /// Returns true if a failure in this state must be compensated with a refund.
    pub fn requires_compensation(&self) -> bool {
        matches!(self, SagaState::PostagePurchased | SagaState::Registered)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::LabelPrinted | SagaState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Start => "Start",
            SagaState::AddressReady => "AddressReady",
            SagaState::PostagePurchased => "PostagePurchased",
            SagaState::Registered => "Registered",
            SagaState::LabelPrinted => "LabelPrinted",
            SagaState::Refunding => "Refunding",
            SagaState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
