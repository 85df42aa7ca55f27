//! Interactive shipping console.
//!
//! Loads [`config::Config`], connects to the postage provider, fulfillment
//! server and geocoding provider, and runs a shipping session in one of the
//! [`app::Mode`]s.

pub mod app;
pub mod config;
pub mod console;
pub mod error;

pub use app::{Mode, SessionSummary, run, ship};
pub use config::{Config, ConfigError};
pub use console::{ConsolePrompter, LinePrompter};
pub use error::CliError;
