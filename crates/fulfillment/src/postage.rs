//! Purchased postage that must be confirmed or refunded.
//!
//! Once a shipment is bought, money has been spent. [`PurchasedPostage`]
//! holds the bought shipment until [`PurchasedPostage::settle`] is called
//! with the outcome of the remaining steps: success confirms the shipment,
//! failure issues exactly one refund. Settling consumes the guard, so a
//! shipment cannot be refunded twice.

use common::ShipmentId;

use crate::error::{PostageError, SagaError};
use crate::services::postage::{PostageProvider, RefundResult, Shipment};

/// How a purchase ended.
#[derive(Debug)]
pub enum Settlement {
    /// Every step after the purchase succeeded.
    Confirmed(Shipment),

    /// A later step failed and the postage was refunded.
    Refunded {
        shipment: Shipment,
        refund: RefundResult,
        cause: SagaError,
    },

    /// A later step failed and the refund failed too.
    RefundFailed {
        shipment: Shipment,
        cause: SagaError,
        refund_error: PostageError,
    },
}

impl Settlement {
    /// Returns the settled shipment.
    pub fn shipment(&self) -> &Shipment {
        match self {
            Settlement::Confirmed(shipment)
            | Settlement::Refunded { shipment, .. }
            | Settlement::RefundFailed { shipment, .. } => shipment,
        }
    }

    /// Converts the settlement into the caller-facing result.
    ///
    /// A refunded failure returns the original error unchanged; a failed
    /// refund returns [`SagaError::CompensationFailed`] carrying both errors.
    pub fn into_result(self) -> Result<Shipment, SagaError> {
        match self {
            Settlement::Confirmed(shipment) => Ok(shipment),
            Settlement::Refunded { cause, .. } => Err(cause),
            Settlement::RefundFailed {
                shipment,
                cause,
                refund_error,
            } => Err(SagaError::CompensationFailed {
                shipment_id: shipment.id,
                cause: Box::new(cause),
                refund: refund_error,
            }),
        }
    }
}

/// A bought shipment awaiting confirmation or refund.
#[must_use = "purchased postage must be settled or it is never refunded"]
pub struct PurchasedPostage<'a, P: PostageProvider + ?Sized> {
    provider: &'a P,
    shipment: Shipment,
    settled: bool,
}

impl<'a, P: PostageProvider + ?Sized> PurchasedPostage<'a, P> {
    /// Takes ownership of a shipment bought from `provider`.
    pub fn new(provider: &'a P, shipment: Shipment) -> Self {
        Self {
            provider,
            shipment,
            settled: false,
        }
    }

    pub fn shipment(&self) -> &Shipment {
        &self.shipment
    }

    pub fn shipment_id(&self) -> &ShipmentId {
        &self.shipment.id
    }

    /// Confirms the shipment on success, refunds it once on failure.
    pub async fn settle(mut self, outcome: Result<(), SagaError>) -> Settlement {
        self.settled = true;
        let shipment = self.shipment.clone();

        let cause = match outcome {
            Ok(()) => return Settlement::Confirmed(shipment),
            Err(cause) => cause,
        };

        tracing::warn!(
            shipment_id = %shipment.id,
            error = %cause,
            "refunding postage after failed step"
        );
        match self.provider.refund(&shipment.id).await {
            Ok(refund) => {
                metrics::counter!("fulfillment_refunds_total", "outcome" => "refunded")
                    .increment(1);
                Settlement::Refunded {
                    shipment,
                    refund,
                    cause,
                }
            }
            Err(refund_error) => {
                metrics::counter!("fulfillment_refunds_total", "outcome" => "failed")
                    .increment(1);
                tracing::error!(
                    shipment_id = %shipment.id,
                    error = %refund_error,
                    "refund failed, postage was charged"
                );
                Settlement::RefundFailed {
                    shipment,
                    cause,
                    refund_error,
                }
            }
        }
    }
}

impl<P: PostageProvider + ?Sized> Drop for PurchasedPostage<'_, P> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::error!(
                shipment_id = %self.shipment.id,
                "purchased postage dropped without confirmation or refund"
            );
        }
    }
}
