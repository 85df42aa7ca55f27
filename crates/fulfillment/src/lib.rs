//! Mail-order shipment fulfillment.
//!
//! This crate holds the parts of the shipping tool that carry real
//! invariants:
//!
//! - [`IdentifierResolver`] maps a scanned or typed token to exactly one
//!   recipient, or to a set of candidates a human has to choose from.
//! - [`CompletionCache`] serves debounced, memoized address suggestions while
//!   an operator types.
//! - [`FulfillmentSaga`] purchases postage, registers the shipment and prints
//!   the label, refunding the postage if anything after the purchase fails.
//!
//! External systems (postage provider, fulfillment server, geocoding
//! provider, label fetching and printing) are reached through the traits in
//! [`services`], each with an in-memory implementation for tests.

pub mod aggregate;
pub mod completion;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod identifier;
pub mod label;
pub mod postage;
pub mod resolver;
pub mod services;
pub mod session;
pub mod state;
pub mod steps;
pub mod units;

pub use aggregate::SagaInstance;
pub use completion::{CompletionCache, CompletionConfig, CompletionSession, Suggestion};
pub use coordinator::{FulfillmentReceipt, FulfillmentSaga};
pub use error::{
    GeocodingError, LabelError, PostageError, PrinterError, SagaError, ServerError, SessionError,
};
pub use events::SagaEvent;
pub use identifier::Identifier;
pub use label::LabelLayout;
pub use postage::{PurchasedPostage, Settlement};
pub use resolver::{Candidate, IdentifierResolver, Provenance, Resolution, ResolutionResult};
pub use services::{
    AddressComponent, FulfillmentServer, GeocodedAddress, GeocodingProvider,
    InMemoryFulfillmentServer, InMemoryGeocodingProvider, InMemoryLabelFetcher,
    InMemoryPostageProvider, InmateRecord, LabelFetcher, LabelPrinter, Parcel, PostageProvider,
    Prediction, Rate, RecordingLabelPrinter, RefundResult, RegistrationTarget, Shipment,
    ShipmentOptions, ShipmentSummary, Unit,
};
pub use session::{
    BulkSource, IndividualSource, ManualSource, Prompter, ScriptedPrompter, ShipmentRequest,
    ShipmentSource,
};
pub use state::SagaState;
pub use units::UnitDirectory;
