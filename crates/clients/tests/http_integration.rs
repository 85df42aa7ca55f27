//! Integration tests for the HTTP clients against a local stub server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clients::{
    DirectoryPrinter, EasyPostClient, GoogleMapsClient, HttpFulfillmentServer, HttpLabelFetcher,
};
use common::{Address, Jurisdiction, Money, PostalAddress, Weight};
use fulfillment::services::label::blank_label_png;
use fulfillment::{
    FulfillmentSaga, FulfillmentServer, GeocodingError, GeocodingProvider, LabelFetcher,
    PostageError, PostageProvider, RegistrationTarget, SagaError, ServerError, ShipmentOptions,
};
use serde_json::{Value, json};

const POSTAGE_KEY: &str = "ep-test-key";
const SERVER_KEY: &str = "ibp-key";
const MAPS_KEY: &str = "maps-key";

#[derive(Clone, Default)]
struct Stub {
    base: String,
    auth_headers: Arc<Mutex<Vec<String>>>,
    parcel_weight: Arc<Mutex<f64>>,
    registrations: Arc<Mutex<Vec<(String, Value)>>>,
    refunds: Arc<Mutex<Vec<String>>>,
    fail_register: Arc<AtomicBool>,
}

fn rate(id: &str, carrier: &str, service: &str, amount: &str) -> Value {
    json!({"id": id, "carrier": carrier, "service": service, "rate": amount})
}

impl Stub {
    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth_headers.lock().unwrap().push(auth);
    }

    fn parcel(&self) -> Value {
        let weight = *self.parcel_weight.lock().unwrap();
        json!({"id": "prcl_1", "predefined_package": "Parcel", "weight": weight})
    }

    fn shipment(&self, id: &str, rates: Vec<Value>) -> Value {
        json!({
            "id": id,
            "parcel": self.parcel(),
            "rates": rates,
            "selected_rate": null,
            "tracking_code": null,
            "tracker": null,
            "postage_label": null
        })
    }
}

async fn verify_address(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.record_auth(&headers);
    if body["address"]["zip"] == "00000" {
        let error = json!({"error": {
            "code": "ADDRESS.VERIFY.FAILURE",
            "message": "Address not found"
        }});
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(error)).into_response();
    }
    Json(json!({"id": "adr_1", "verifications": {}})).into_response()
}

async fn create_parcel(State(stub): State<Stub>, Json(body): Json<Value>) -> Json<Value> {
    *stub.parcel_weight.lock().unwrap() = body["parcel"]["weight"].as_f64().unwrap_or_default();
    Json(stub.parcel())
}

async fn create_shipment(State(stub): State<Stub>, Json(body): Json<Value>) -> Json<Value> {
    let mut rates = vec![
        rate("rate_priority", "USPS", "Priority", "9.10"),
        rate("rate_ground", "UPS", "Ground", "3.90"),
    ];
    if body["shipment"]["options"]["special_rates_eligibility"] == "USPS.LIBRARYMAIL" {
        rates.push(rate("rate_library", "USPS", "LibraryMail", "4.80"));
    }
    Json(stub.shipment("shp_1", rates))
}

async fn buy(
    State(stub): State<Stub>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let selected = match body["rate"]["id"].as_str() {
        Some("rate_library") => rate("rate_library", "USPS", "LibraryMail", "4.80"),
        _ => rate("rate_priority", "USPS", "Priority", "9.10"),
    };
    let mut shipment = stub.shipment(&id, Vec::new());
    shipment["selected_rate"] = selected;
    shipment["tracking_code"] = json!("9400TEST0001");
    shipment["tracker"] = json!({"public_url": "https://track.example/9400TEST0001"});
    shipment["postage_label"] = json!({"label_url": format!("{}labels/{id}.png", stub.base)});
    Json(shipment)
}

async fn refund(State(stub): State<Stub>, Path(id): Path<String>) -> Json<Value> {
    stub.refunds.lock().unwrap().push(id.clone());
    let mut shipment = stub.shipment(&id, Vec::new());
    shipment["refund_status"] = json!("submitted");
    Json(shipment)
}

fn server_authorized(headers: &HeaderMap) -> bool {
    headers.get("X-API-Key").and_then(|v| v.to_str().ok()) == Some(SERVER_KEY)
}

async fn units(headers: HeaderMap) -> Response {
    if !server_authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"units": [
        {"jurisdiction": "TEX", "name": "Coffield"},
        {"jurisdiction": "FED", "name": "FCI Bastrop"}
    ]}))
    .into_response()
}

async fn unit_address(Path((jurisdiction, name)): Path<(String, String)>) -> Response {
    if jurisdiction == "TEX" && name == "SAN ANGELO WORK CAMP" {
        return Json(json!({
            "name": "ATTN: Mailroom Staff",
            "street1": "San Angelo Work Camp",
            "street2": "1675 S. FM 3525",
            "city": "Colorado City",
            "state": "TX",
            "zipcode": "79512"
        }))
        .into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

async fn inmate(Path((jurisdiction, id)): Path<(String, u64)>) -> Response {
    if jurisdiction == "TEX" && id == 268601 {
        return Json(json!({
            "jurisdiction": "TEX",
            "id": 268601,
            "first_name": "Timothy",
            "last_name": "Louis",
            "unit": "COFFIELD"
        }))
        .into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

async fn config() -> Json<Value> {
    Json(json!({"address": {
        "addressee": "Inside Books Project",
        "street1": "827 West 12th St",
        "street2": "",
        "city": "Austin",
        "state": "TX",
        "zipcode": "78701"
    }}))
}

async fn ship_unit(
    State(stub): State<Stub>,
    Path((jurisdiction, name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    if stub.fail_register.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    stub.registrations
        .lock()
        .unwrap()
        .push((format!("{jurisdiction}/{name}"), body));
    StatusCode::OK
}

async fn autocomplete(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("key").map(String::as_str) != Some(MAPS_KEY) {
        return Json(json!({"status": "REQUEST_DENIED", "error_message": "invalid key"}));
    }
    assert_eq!(params.get("components").map(String::as_str), Some("country:us"));
    let input = params.get("input").cloned().unwrap_or_default();
    Json(json!({
        "status": "OK",
        "predictions": [
            {"description": format!("{input} Ave, Austin, TX, USA"), "place_id": "p1"},
            {"description": format!("{input} St, Dallas, TX, USA"), "place_id": "p2"}
        ]
    }))
}

async fn geocode(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    assert_eq!(params.get("region").map(String::as_str), Some("us"));
    if params.get("address").map(String::as_str) != Some("1100 Congress Ave, Austin, TX") {
        return Json(json!({"status": "ZERO_RESULTS", "results": []}));
    }
    Json(json!({
        "status": "OK",
        "results": [{"address_components": [
            {"long_name": "1100", "short_name": "1100", "types": ["street_number"]},
            {"long_name": "Congress Avenue", "short_name": "Congress Ave", "types": ["route"]},
            {"long_name": "Austin", "short_name": "Austin", "types": ["locality"]},
            {"long_name": "Texas", "short_name": "TX", "types": ["administrative_area_level_1"]},
            {"long_name": "78701", "short_name": "78701", "types": ["postal_code"]}
        ]}]
    }))
}

async fn label_image(Path(file): Path<String>) -> Response {
    if !file.ends_with(".png") {
        return StatusCode::NOT_FOUND.into_response();
    }
    match blank_label_png(400, 600) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn spawn_stub() -> Stub {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stub = Stub {
        base: format!("http://{addr}/"),
        ..Stub::default()
    };

    let app = Router::new()
        .route("/v2/addresses/create_and_verify", post(verify_address))
        .route("/v2/parcels", post(create_parcel))
        .route("/v2/shipments", post(create_shipment))
        .route("/v2/shipments/{id}/buy", post(buy))
        .route("/v2/shipments/{id}/refund", post(refund))
        .route("/ibp/units", get(units))
        .route("/ibp/unit/{jurisdiction}/{name}/address", get(unit_address))
        .route("/ibp/unit/{jurisdiction}/{name}/ship", post(ship_unit))
        .route("/ibp/inmate/{jurisdiction}/{id}", get(inmate))
        .route("/ibp/config", get(config))
        .route("/maps/place/autocomplete/json", get(autocomplete))
        .route("/maps/geocode/json", get(geocode))
        .route("/labels/{file}", get(label_image))
        .with_state(stub.clone());

    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    stub
}

fn postage(stub: &Stub) -> EasyPostClient {
    EasyPostClient::with_base_url(POSTAGE_KEY, &format!("{}v2", stub.base)).unwrap()
}

fn server(stub: &Stub) -> HttpFulfillmentServer {
    HttpFulfillmentServer::new(&format!("{}ibp/", stub.base), SERVER_KEY).unwrap()
}

fn maps(stub: &Stub, key: &str) -> GoogleMapsClient {
    GoogleMapsClient::with_base_url(key, &format!("{}maps/", stub.base)).unwrap()
}

fn austin() -> Address {
    Address::new("Jane Doe", "1100 Congress Ave", "Austin", "TX", "78701")
}

#[tokio::test]
async fn test_postage_purchase_picks_library_mail() {
    let stub = spawn_stub().await;
    let client = postage(&stub);
    let from = PostalAddress::from(&austin());
    let to = PostalAddress::from(&austin());

    let parcel = client.create_parcel(Weight::from_pounds(5).unwrap()).await.unwrap();
    assert_eq!(parcel.weight.ounces(), 80);

    let shipment = client
        .create_shipment(&from, &to, &parcel, &ShipmentOptions::library_mail())
        .await
        .unwrap();
    let rate = client.lowest_rate(&shipment, &["USPS"]).unwrap();
    assert_eq!(rate.service, "LibraryMail");
    assert_eq!(rate.amount, Money::from_cents(480));

    let bought = client.buy(&shipment, &rate).await.unwrap();
    assert_eq!(bought.tracking_code.as_deref(), Some("9400TEST0001"));
    assert_eq!(
        bought.label_url,
        Some(format!("{}labels/shp_1.png", stub.base))
    );
}

#[tokio::test]
async fn test_address_rejection_carries_provider_message() {
    let stub = spawn_stub().await;
    let client = postage(&stub);
    let mut bad = PostalAddress::from(&austin());
    bad.zip = "00000".to_string();

    assert!(client.verify_address(&PostalAddress::from(&austin())).await.is_ok());
    let err = client.verify_address(&bad).await.unwrap_err();
    assert_eq!(err, PostageError::AddressRejected("Address not found".to_string()));
    assert!(
        stub.auth_headers
            .lock()
            .unwrap()
            .iter()
            .all(|a| a.starts_with("Basic "))
    );
}

#[tokio::test]
async fn test_server_lookups_and_misses() {
    let stub = spawn_stub().await;
    let server = server(&stub);

    let units = server.list_units().await.unwrap();
    assert_eq!(units.len(), 2);

    let address = server
        .get_unit_address(Jurisdiction::Texas, "SAN ANGELO WORK CAMP")
        .await
        .unwrap();
    assert_eq!(address.city, "Colorado City");
    assert_eq!(address.street2(), Some("1675 S. FM 3525"));

    let inmate = server.get_inmate(Jurisdiction::Texas, 268601).await.unwrap();
    assert_eq!(inmate.addressee(), "Timothy Louis #00268601");

    let miss = server.get_inmate(Jurisdiction::Federal, 268601).await;
    assert!(matches!(miss, Err(ServerError::NotFound(_))));

    let return_address = server.get_return_address().await.unwrap();
    assert_eq!(return_address.name, "Inside Books Project");
    assert_eq!(return_address.street2(), None);
}

#[tokio::test]
async fn test_server_rejects_wrong_api_key() {
    let stub = spawn_stub().await;
    let server = HttpFulfillmentServer::new(&format!("{}ibp", stub.base), "wrong").unwrap();

    let err = server.list_units().await.unwrap_err();
    assert!(matches!(err, ServerError::Rejected { status: 401, .. }));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_unreachable_server_is_fatal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let server = HttpFulfillmentServer::new(&format!("http://{addr}/"), SERVER_KEY).unwrap();

    let err = server.get_return_address().await.unwrap_err();
    assert!(err.is_fatal(), "expected connectivity error, got {err:?}");
}

#[tokio::test]
async fn test_autocomplete_and_geocode() {
    let stub = spawn_stub().await;
    let client = maps(&stub, MAPS_KEY);

    let predictions = client.autocomplete("1100 Congress", "US").await.unwrap();
    let texts: Vec<&str> = predictions.iter().map(|p| p.description.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "1100 Congress Ave, Austin, TX, USA",
            "1100 Congress St, Dallas, TX, USA"
        ]
    );

    let geocoded = client
        .geocode("1100 Congress Ave, Austin, TX")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(geocoded.street1, "1100 Congress Avenue");
    assert_eq!(geocoded.state, "TX");

    assert_eq!(client.geocode("nowhere").await.unwrap(), None);
}

#[tokio::test]
async fn test_maps_api_error_status() {
    let stub = spawn_stub().await;
    let client = maps(&stub, "wrong");

    let err = client.autocomplete("1100 Congress", "US").await.unwrap_err();
    assert_eq!(
        err,
        GeocodingError::Api {
            status: "REQUEST_DENIED".to_string(),
            message: "invalid key".to_string()
        }
    );
}

#[tokio::test]
async fn test_label_fetch_404_is_fetch_error() {
    let stub = spawn_stub().await;
    let fetcher = HttpLabelFetcher::new().unwrap();

    let bytes = fetcher
        .fetch(&format!("{}labels/shp_1.png", stub.base))
        .await
        .unwrap();
    assert!(!bytes.is_empty());

    let missing = format!("{}labels/shp_1.gif", stub.base);
    let err = fetcher.fetch(&missing).await.unwrap_err();
    assert!(err.to_string().contains(&missing));
}

#[tokio::test]
async fn test_saga_over_http_registers_and_saves_label() {
    let stub = spawn_stub().await;
    let out = tempfile::tempdir().unwrap();
    let saga = FulfillmentSaga::new(
        postage(&stub),
        server(&stub),
        HttpLabelFetcher::new().unwrap(),
        DirectoryPrinter::new(out.path()),
    );
    let return_address = saga.server().get_return_address().await.unwrap();
    let to = saga
        .server()
        .get_unit_address(Jurisdiction::Texas, "San Angelo Work Camp")
        .await
        .unwrap();
    let target = RegistrationTarget::Unit {
        jurisdiction: Jurisdiction::Texas,
        name: "SAN ANGELO WORK CAMP".to_string(),
    };

    let receipt = saga
        .fulfill(
            &return_address,
            &to,
            Weight::from_pounds(3).unwrap(),
            Some(&target),
        )
        .await
        .unwrap();

    assert!(receipt.address_verified());
    let registrations = stub.registrations.lock().unwrap().clone();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].0, "TEX/SAN ANGELO WORK CAMP");
    assert_eq!(registrations[0].1["postage"], 480);
    assert_eq!(registrations[0].1["weight"], 48);
    assert_eq!(registrations[0].1["tracking_code"], "9400TEST0001");
    assert!(out.path().join("9400TEST0001.png").exists());
    assert!(stub.refunds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_saga_over_http_refunds_on_registration_failure() {
    let stub = spawn_stub().await;
    stub.fail_register.store(true, Ordering::SeqCst);
    let out = tempfile::tempdir().unwrap();
    let saga = FulfillmentSaga::new(
        postage(&stub),
        server(&stub),
        HttpLabelFetcher::new().unwrap(),
        DirectoryPrinter::new(out.path()),
    );
    let target = RegistrationTarget::Unit {
        jurisdiction: Jurisdiction::Texas,
        name: "SAN ANGELO WORK CAMP".to_string(),
    };

    let err = saga
        .fulfill(
            &austin(),
            &austin(),
            Weight::from_pounds(1).unwrap(),
            Some(&target),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SagaError::Registration(ServerError::Rejected { status: 500, .. })
    ));
    assert!(!err.postage_charged());
    assert_eq!(*stub.refunds.lock().unwrap(), vec!["shp_1".to_string()]);
    assert!(!out.path().join("9400TEST0001.png").exists());
}
