//! Saga coordinator for fulfilling one shipment.

use std::future::Future;
use std::time::Instant;

use common::{Address, PostalAddress, SagaId, Weight};

use crate::aggregate::SagaInstance;
use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::label::LabelLayout;
use crate::postage::{PurchasedPostage, Settlement};
use crate::services::label::{LabelFetcher, LabelPrinter};
use crate::services::postage::{PostageProvider, Rate, Shipment, ShipmentOptions};
use crate::services::server::{FulfillmentServer, RegistrationTarget, ShipmentSummary};
use crate::steps;

/// Result of a successful fulfillment.
#[derive(Debug, Clone)]
pub struct FulfillmentReceipt {
    /// The saga run, including its journal.
    pub saga: SagaInstance,
    /// The bought, registered and printed shipment.
    pub shipment: Shipment,
}

impl FulfillmentReceipt {
    /// Returns whether the postage provider verified the destination.
    pub fn address_verified(&self) -> bool {
        self.saga.address_verified()
    }
}

/// Orchestrates the fulfillment saga.
///
/// The saga validates both addresses, buys postage, registers the shipment
/// (when a target is given) and prints the label. Once postage is bought,
/// any failure triggers exactly one refund before the error is returned.
pub struct FulfillmentSaga<P, S, F, L>
where
    P: PostageProvider,
    S: FulfillmentServer,
    F: LabelFetcher,
    L: LabelPrinter,
{
    postage: P,
    server: S,
    fetcher: F,
    printer: L,
    layout: LabelLayout,
}

impl<P, S, F, L> FulfillmentSaga<P, S, F, L>
where
    P: PostageProvider,
    S: FulfillmentServer,
    F: LabelFetcher,
    L: LabelPrinter,
{
    /// Creates a saga that prints labels without a logo.
    pub fn new(postage: P, server: S, fetcher: F, printer: L) -> Self {
        Self {
            postage,
            server,
            fetcher,
            printer,
            layout: LabelLayout::new(),
        }
    }

    /// Replaces the label layout.
    pub fn with_layout(mut self, layout: LabelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Returns the fulfillment server the saga registers shipments with.
    pub fn server(&self) -> &S {
        &self.server
    }

    /// Fulfills one shipment.
    ///
    /// `registration` is `None` for manual shipments, which are not recorded
    /// on the fulfillment server.
    pub async fn fulfill(
        &self,
        from: &Address,
        to: &Address,
        weight: Weight,
        registration: Option<&RegistrationTarget>,
    ) -> Result<FulfillmentReceipt, SagaError> {
        let (saga, result) = self.fulfill_recorded(from, to, weight, registration).await;
        result.map(|shipment| FulfillmentReceipt { saga, shipment })
    }

    /// Fulfills one shipment and returns the saga run whatever the outcome.
    #[tracing::instrument(
        skip(self, from, to),
        fields(saga_type = steps::SAGA_TYPE, weight = %weight)
    )]
    pub async fn fulfill_recorded(
        &self,
        from: &Address,
        to: &Address,
        weight: Weight,
        registration: Option<&RegistrationTarget>,
    ) -> (SagaInstance, Result<Shipment, SagaError>) {
        metrics::counter!("fulfillment_saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let saga_id = SagaId::new();
        let mut saga = SagaInstance::default();
        saga.apply(SagaEvent::saga_started(
            saga_id,
            steps::SAGA_TYPE,
            weight.ounces(),
            registration.is_some(),
        ));

        let result = self.run(&mut saga, from, to, weight, registration).await;
        debug_assert!(saga.state().is_terminal(), "saga ended in {}", saga.state());

        metrics::histogram!("fulfillment_saga_duration_seconds")
            .record(saga_start.elapsed().as_secs_f64());
        match &result {
            Ok(shipment) => {
                metrics::counter!("fulfillment_saga_completed").increment(1);
                tracing::info!(%saga_id, shipment_id = %shipment.id, "saga completed");
            }
            Err(e) => {
                metrics::counter!("fulfillment_saga_failed", "stage" => e.stage()).increment(1);
                tracing::warn!(
                    %saga_id,
                    stage = e.stage(),
                    postage_charged = e.postage_charged(),
                    error = %e,
                    "saga failed"
                );
            }
        }
        (saga, result)
    }

    async fn run(
        &self,
        saga: &mut SagaInstance,
        from: &Address,
        to: &Address,
        weight: Weight,
        registration: Option<&RegistrationTarget>,
    ) -> Result<Shipment, SagaError> {
        // 1. Validate both addresses; nothing has been spent yet
        let validated = self
            .step(saga, steps::STEP_VALIDATE, async {
                from.validate()?;
                to.validate()?;
                Ok::<_, SagaError>(())
            })
            .await;
        if let Err(e) = validated {
            saga.apply(SagaEvent::saga_failed(e.to_string(), false));
            return Err(e);
        }

        let from = PostalAddress::from(from);
        let to = PostalAddress::from(to);

        // 2. Verify the destination (advisory only)
        let verified = self.verify_address(&to).await;
        saga.apply(SagaEvent::address_ready(verified));

        // 3. Buy postage; from here on failures are compensated
        debug_assert!(saga.state().can_purchase());
        let purchased = self
            .step(
                saga,
                steps::STEP_PURCHASE_POSTAGE,
                self.purchase(&from, &to, weight),
            )
            .await;
        let (shipment, rate) = match purchased {
            Ok(bought) => bought,
            Err(e) => {
                saga.apply(SagaEvent::saga_failed(e.to_string(), false));
                return Err(e);
            }
        };
        saga.apply(SagaEvent::postage_purchased(
            shipment.id.clone(),
            rate.amount,
            rate.carrier.clone(),
            rate.service.clone(),
            shipment.tracking_code.clone(),
        ));
        let postage = PurchasedPostage::new(&self.postage, shipment);

        // 4. Register and print inside the guarded region
        let outcome = self
            .register_and_print(saga, postage.shipment(), registration)
            .await;
        if let Err(e) = &outcome {
            debug_assert!(saga.state().requires_compensation());
            tracing::warn!(failed_step = e.stage(), "starting compensation");
            saga.apply(SagaEvent::compensation_started(e.stage()));
        }

        // 5. Confirm or refund
        let settlement = postage.settle(outcome).await;
        match &settlement {
            Settlement::Confirmed(_) => saga.apply(SagaEvent::saga_completed()),
            Settlement::Refunded { cause, .. } => {
                saga.apply(SagaEvent::compensation_step_completed(
                    steps::STEP_REFUND_POSTAGE,
                ));
                saga.apply(SagaEvent::saga_failed(cause.to_string(), true));
            }
            Settlement::RefundFailed {
                cause,
                refund_error,
                ..
            } => {
                saga.apply(SagaEvent::compensation_step_failed(
                    steps::STEP_REFUND_POSTAGE,
                    refund_error.to_string(),
                ));
                saga.apply(SagaEvent::saga_failed(cause.to_string(), false));
            }
        }
        settlement.into_result()
    }

    /// Runs one step, recording its start and outcome in the journal.
    async fn step<T>(
        &self,
        saga: &mut SagaInstance,
        step: &'static str,
        work: impl Future<Output = Result<T, SagaError>>,
    ) -> Result<T, SagaError> {
        tracing::info!(step, "saga step started");
        saga.apply(SagaEvent::step_started(step));

        match work.await {
            Ok(value) => {
                saga.apply(SagaEvent::step_completed(step));
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(step, error = %e, "saga step failed");
                saga.apply(SagaEvent::step_failed(step, e.to_string()));
                Err(e)
            }
        }
    }

    async fn verify_address(&self, to: &PostalAddress) -> bool {
        match self.postage.verify_address(to).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    step = steps::STEP_VERIFY_ADDRESS,
                    error = %e,
                    "destination not verified"
                );
                false
            }
        }
    }

    async fn purchase(
        &self,
        from: &PostalAddress,
        to: &PostalAddress,
        weight: Weight,
    ) -> Result<(Shipment, Rate), SagaError> {
        let parcel = self
            .postage
            .create_parcel(weight)
            .await
            .map_err(SagaError::Purchase)?;
        let shipment = self
            .postage
            .create_shipment(from, to, &parcel, &ShipmentOptions::library_mail())
            .await
            .map_err(SagaError::Purchase)?;
        let rate = self
            .postage
            .lowest_rate(&shipment, &[steps::CARRIER_USPS])
            .map_err(SagaError::Purchase)?;
        let bought = self
            .postage
            .buy(&shipment, &rate)
            .await
            .map_err(SagaError::Purchase)?;

        tracing::info!(
            shipment_id = %bought.id,
            rate = %rate.amount,
            service = %rate.service,
            "postage purchased"
        );
        Ok((bought, rate))
    }

    async fn register_and_print(
        &self,
        saga: &mut SagaInstance,
        shipment: &Shipment,
        registration: Option<&RegistrationTarget>,
    ) -> Result<(), SagaError> {
        if let Some(target) = registration {
            self.step(
                saga,
                steps::STEP_REGISTER_SHIPMENT,
                self.register(shipment, target),
            )
            .await?;
        }
        self.step(saga, steps::STEP_PRINT_LABEL, self.print_label(shipment))
            .await
    }

    async fn register(
        &self,
        shipment: &Shipment,
        target: &RegistrationTarget,
    ) -> Result<(), SagaError> {
        let summary = ShipmentSummary::from_shipment(shipment)?;
        self.server
            .register_shipment(&summary, target)
            .await
            .map_err(SagaError::Registration)?;
        tracing::info!(shipment_id = %shipment.id, %target, "shipment registered");
        Ok(())
    }

    async fn print_label(&self, shipment: &Shipment) -> Result<(), SagaError> {
        let url = shipment
            .label_url
            .as_deref()
            .ok_or_else(|| SagaError::IncompleteShipment {
                step: steps::STEP_PRINT_LABEL,
                shipment_id: shipment.id.clone(),
                field: "label url",
            })?;
        let bytes = self.fetcher.fetch(url).await.map_err(SagaError::Label)?;
        let label = self.layout.compose(&bytes).map_err(SagaError::Label)?;
        let name = shipment
            .tracking_code
            .as_deref()
            .unwrap_or(shipment.id.as_str());
        self.printer
            .print(&label, name)
            .await
            .map_err(SagaError::Printer)
    }
}
