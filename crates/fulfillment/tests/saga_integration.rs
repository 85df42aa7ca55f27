//! Integration tests for the fulfillment saga.

use common::{Address, Jurisdiction, Money, ShipmentId, Weight};
use fulfillment::{
    FulfillmentSaga, InMemoryFulfillmentServer, InMemoryLabelFetcher, InMemoryPostageProvider,
    LabelError, LabelLayout, RecordingLabelPrinter, RegistrationTarget, SagaError, SagaEvent,
    SagaState, ServerError,
};
use image::{DynamicImage, Rgba, RgbaImage};

type TestSaga = FulfillmentSaga<
    InMemoryPostageProvider,
    InMemoryFulfillmentServer,
    InMemoryLabelFetcher,
    RecordingLabelPrinter,
>;

struct TestHarness {
    saga: TestSaga,
    postage: InMemoryPostageProvider,
    server: InMemoryFulfillmentServer,
    fetcher: InMemoryLabelFetcher,
    printer: RecordingLabelPrinter,
}

impl TestHarness {
    fn new() -> Self {
        let postage = InMemoryPostageProvider::new();
        let server = InMemoryFulfillmentServer::new();
        let fetcher = InMemoryLabelFetcher::new();
        let printer = RecordingLabelPrinter::new();

        let saga = FulfillmentSaga::new(
            postage.clone(),
            server.clone(),
            fetcher.clone(),
            printer.clone(),
        );

        Self {
            saga,
            postage,
            server,
            fetcher,
            printer,
        }
    }

    fn with_logo(mut self) -> Self {
        let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255])));
        self.saga = self.saga.with_layout(LabelLayout::new().with_logo(logo));
        self
    }
}

fn return_address() -> Address {
    Address::new(
        "Inside Books Project",
        "827 West 12th St",
        "Austin",
        "TX",
        "78701",
    )
}

fn unit_address() -> Address {
    Address::new(
        "ATTN: Mailroom Staff",
        "1675 S. FM 3525",
        "Colorado City",
        "TX",
        "79512",
    )
    .with_street2("San Angelo Work Camp")
}

fn ship_unit(id: u32) -> RegistrationTarget {
    RegistrationTarget::Unit {
        jurisdiction: Jurisdiction::Texas,
        name: format!("UNIT {id}"),
    }
}

fn pounds(n: i64) -> Weight {
    Weight::from_pounds(n).unwrap()
}

#[tokio::test]
async fn test_end_to_end_registers_and_prints() {
    let harness = TestHarness::new();
    let target = ship_unit(42);

    let receipt = harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(5), Some(&target))
        .await
        .unwrap();

    assert_eq!(receipt.shipment.id, ShipmentId::new("shp_1"));
    assert_eq!(
        receipt.shipment.selected_rate.as_ref().map(|r| r.amount),
        Some(Money::from_cents(480))
    );
    assert_eq!(receipt.saga.state(), SagaState::LabelPrinted);
    assert!(!receipt.saga.refunded());

    // Exactly one registration, for the purchased shipment
    let registrations = harness.server.registrations();
    assert_eq!(registrations.len(), 1);
    let (summary, registered_target) = &registrations[0];
    assert_eq!(summary.shipment_id.as_str(), "shp_1");
    assert_eq!(summary.postage, 480);
    assert_eq!(summary.weight, 80);
    assert_eq!(registered_target, &target);

    // Label fetched from the provider's URL and printed
    assert_eq!(
        harness.fetcher.fetched(),
        vec!["https://labels.example/shp_1.png"]
    );
    assert_eq!(
        harness.printer.printed(),
        vec![("TRACK-0001".to_string(), 800, 1200)]
    );

    assert!(harness.postage.refunds().is_empty());
}

#[tokio::test]
async fn test_registration_failure_refunds_and_returns_original_error() {
    let harness = TestHarness::new();
    harness.server.set_fail_on_register(true);

    let result = harness
        .saga
        .fulfill(
            &return_address(),
            &unit_address(),
            pounds(5),
            Some(&ship_unit(42)),
        )
        .await;

    match result {
        Err(SagaError::Registration(ServerError::Rejected { status, message })) => {
            assert_eq!(status, 500);
            assert_eq!(message, "shipment ledger unavailable");
        }
        other => panic!("expected the registration error, got {other:?}"),
    }
    assert_eq!(harness.postage.refunds(), vec![ShipmentId::new("shp_1")]);
    assert!(harness.fetcher.fetched().is_empty());
    assert!(harness.printer.printed().is_empty());
}

#[tokio::test]
async fn test_label_fetch_failure_refunds_and_returns_original_error() {
    let harness = TestHarness::new();
    harness.fetcher.set_fail_on_fetch(true);

    let (saga, result) = harness
        .saga
        .fulfill_recorded(
            &return_address(),
            &unit_address(),
            pounds(5),
            Some(&ship_unit(42)),
        )
        .await;

    match result {
        Err(SagaError::Label(LabelError::Fetch { url, .. })) => {
            assert_eq!(url, "https://labels.example/shp_1.png");
        }
        other => panic!("expected the label fetch error, got {other:?}"),
    }
    assert_eq!(harness.postage.refunds(), vec![ShipmentId::new("shp_1")]);
    assert_eq!(saga.state(), SagaState::Failed);
    assert!(saga.refunded());
    assert!(matches!(
        saga.journal().last(),
        Some(SagaEvent::SagaFailed(data)) if data.refunded
    ));
}

#[tokio::test]
async fn test_zero_weight_never_reaches_provider() {
    let harness = TestHarness::new();

    // Weight cannot be constructed as zero, so the saga is never started
    assert!(Weight::from_pounds(0).is_err());
    assert!("-1".parse::<Weight>().is_err());
    assert_eq!(harness.postage.shipment_count(), 0);
}

#[tokio::test]
async fn test_each_run_buys_its_own_shipment() {
    let harness = TestHarness::new();
    let target = ship_unit(7);

    let first = harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(1), Some(&target))
        .await
        .unwrap();
    let second = harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(1), Some(&target))
        .await
        .unwrap();

    assert_eq!(first.shipment.id.as_str(), "shp_1");
    assert_eq!(second.shipment.id.as_str(), "shp_2");
    assert_ne!(first.saga.id(), second.saga.id());
    assert_eq!(harness.server.registrations().len(), 2);
}

#[tokio::test]
async fn test_failure_after_success_does_not_touch_earlier_shipment() {
    let harness = TestHarness::new();
    let target = ship_unit(7);

    harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(1), Some(&target))
        .await
        .unwrap();

    harness.printer.set_fail_on_print(true);
    let err = harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(1), Some(&target))
        .await
        .unwrap_err();

    assert!(matches!(err, SagaError::Printer(_)));
    assert_eq!(harness.postage.refunds(), vec![ShipmentId::new("shp_2")]);
}

#[tokio::test]
async fn test_logo_is_composited_before_printing() {
    let harness = TestHarness::new().with_logo();

    harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(3), None)
        .await
        .unwrap();

    assert_eq!(harness.printer.printed().len(), 1);
}

#[tokio::test]
async fn test_refund_failure_surfaces_both_errors() {
    let harness = TestHarness::new();
    harness.fetcher.set_fail_on_fetch(true);
    harness.postage.set_fail_on_refund(true);

    let err = harness
        .saga
        .fulfill(&return_address(), &unit_address(), pounds(2), None)
        .await
        .unwrap_err();

    assert!(err.postage_charged());
    assert_eq!(err.stage(), "refund_postage");
    let message = err.to_string();
    assert!(message.contains("shp_1"));
    assert!(message.contains("connection reset"));
    assert!(message.contains("refund endpoint timed out"));
}

#[tokio::test]
async fn test_every_outcome_ends_in_terminal_state() {
    let blank = Address::new("", "", "", "", "");
    let cases: [(&str, fn(&TestHarness)); 4] = [
        ("completed", |_| {}),
        ("purchase failed", |h| h.postage.set_fail_on_buy(true)),
        ("refunded", |h| h.server.set_fail_on_register(true)),
        ("refund failed", |h| {
            h.server.set_fail_on_register(true);
            h.postage.set_fail_on_refund(true);
        }),
    ];

    for (name, arrange) in cases {
        let harness = TestHarness::new();
        arrange(&harness);
        let (saga, _) = harness
            .saga
            .fulfill_recorded(&return_address(), &unit_address(), pounds(1), Some(&ship_unit(1)))
            .await;
        assert!(saga.state().is_terminal(), "{name}: ended in {}", saga.state());
    }

    let harness = TestHarness::new();
    let (saga, result) = harness
        .saga
        .fulfill_recorded(&return_address(), &blank, pounds(1), None)
        .await;
    assert!(matches!(result, Err(SagaError::Validation(_))));
    assert_eq!(saga.state(), SagaState::Failed);
}
