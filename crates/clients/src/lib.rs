//! Production collaborators for the fulfillment saga.
//!
//! Each client implements one of the traits in `fulfillment::services`
//! over HTTP:
//!
//! - [`EasyPostClient`]: postage purchase and refunds
//! - [`HttpFulfillmentServer`]: units, inmates and shipment registration
//! - [`GoogleMapsClient`]: address autocomplete and geocoding
//! - [`HttpLabelFetcher`], [`SystemViewerPrinter`] and [`DirectoryPrinter`]:
//!   label download and output

pub mod easypost;
pub mod error;
pub mod google_maps;
mod http;
pub mod ibp;
pub mod label;

pub use easypost::EasyPostClient;
pub use error::ClientError;
pub use google_maps::GoogleMapsClient;
pub use ibp::HttpFulfillmentServer;
pub use label::{DirectoryPrinter, HttpLabelFetcher, SystemViewerPrinter};
