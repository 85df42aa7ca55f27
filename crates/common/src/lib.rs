//! Shared value types used across the shipping workspace.
//!
//! Everything here is plain data: addresses, weights, money amounts and the
//! jurisdictions that partition inmate records. Validation happens at
//! construction so that downstream code can rely on the invariants.

pub mod address;
pub mod error;
pub mod jurisdiction;
pub mod money;
pub mod types;
pub mod weight;

pub use address::{Address, PostalAddress};
pub use error::ValidationError;
pub use jurisdiction::Jurisdiction;
pub use money::Money;
pub use types::{SagaId, ShipmentId};
pub use weight::Weight;
