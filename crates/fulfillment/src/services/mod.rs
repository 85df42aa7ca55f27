//! External collaborator traits and in-memory implementations.

pub mod geocoding;
pub mod label;
pub mod postage;
pub mod server;

pub use geocoding::{
    AddressComponent, GeocodedAddress, GeocodingProvider, InMemoryGeocodingProvider, Prediction,
};
pub use label::{InMemoryLabelFetcher, LabelFetcher, LabelPrinter, RecordingLabelPrinter};
pub use postage::{
    InMemoryPostageProvider, Parcel, PostageProvider, Rate, RefundResult, Shipment,
    ShipmentOptions,
};
pub use server::{
    FulfillmentServer, InMemoryFulfillmentServer, InmateRecord, RegistrationTarget,
    ShipmentSummary, Unit,
};
