//! Shipping session wiring.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use clients::{
    DirectoryPrinter, EasyPostClient, GoogleMapsClient, HttpFulfillmentServer, HttpLabelFetcher,
    SystemViewerPrinter,
};
use common::Money;
use fulfillment::{
    BulkSource, FulfillmentSaga, FulfillmentServer, IdentifierResolver, IndividualSource,
    LabelFetcher, LabelLayout, LabelPrinter, ManualSource, PostageProvider, PrinterError,
    Prompter, ShipmentSource,
};
use image::DynamicImage;

use crate::config::{Config, LabelConfig};
use crate::error::Result;

/// How destinations are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Scan or type an inmate identifier per shipment.
    Individual,
    /// Pick a unit by name for bulk shipments.
    Bulk,
    /// Type any address, with suggestions.
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Individual => "individual",
            Mode::Bulk => "bulk",
            Mode::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Totals for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub shipped: usize,
    pub failed: usize,
    /// Postage spent and not refunded.
    pub charged: Money,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shipped, {} failed, {} charged",
            self.shipped, self.failed, self.charged
        )
    }
}

/// Label output chosen by configuration.
#[derive(Debug, Clone)]
pub enum OutputPrinter {
    Viewer(SystemViewerPrinter),
    Directory(DirectoryPrinter),
}

impl OutputPrinter {
    pub fn from_config(config: &LabelConfig) -> Self {
        match &config.output_dir {
            Some(dir) => OutputPrinter::Directory(DirectoryPrinter::new(dir)),
            None => OutputPrinter::Viewer(SystemViewerPrinter::new()),
        }
    }
}

#[async_trait]
impl LabelPrinter for OutputPrinter {
    async fn print(
        &self,
        label: &DynamicImage,
        name: &str,
    ) -> std::result::Result<(), PrinterError> {
        match self {
            OutputPrinter::Viewer(printer) => printer.print(label, name).await,
            OutputPrinter::Directory(printer) => printer.print(label, name).await,
        }
    }
}

/// Builds the label layout, loading the logo if one is configured.
pub fn label_layout(config: &LabelConfig) -> Result<LabelLayout> {
    let layout = LabelLayout::new().with_offset(config.offset_x, config.offset_y);
    match &config.logo {
        Some(path) => Ok(layout.load_logo(path)?),
        None => Ok(layout),
    }
}

/// Fulfills shipments from `source` until the operator ends input.
///
/// A failed shipment is reported and the session continues. Only source
/// errors (broken input, unreachable server) end the session early.
pub async fn ship<P, S, F, L>(
    saga: &FulfillmentSaga<P, S, F, L>,
    source: &mut dyn ShipmentSource,
    prompter: &mut dyn Prompter,
) -> Result<SessionSummary>
where
    P: PostageProvider,
    S: FulfillmentServer,
    F: LabelFetcher,
    L: LabelPrinter,
{
    let from = saga.server().get_return_address().await?;
    let mut summary = SessionSummary::default();

    while let Some(request) = source.next(prompter).await? {
        let (instance, result) = saga
            .fulfill_recorded(
                &from,
                &request.to_address,
                request.weight,
                request.registration.as_ref(),
            )
            .await;
        let rate = instance.rate().unwrap_or_default();

        match result {
            Ok(shipment) => {
                summary.shipped += 1;
                summary.charged = summary.charged + rate;
                let tracking = shipment
                    .tracking_code
                    .as_deref()
                    .unwrap_or(shipment.id.as_str());
                if !instance.address_verified() {
                    prompter.say("warning: destination address could not be verified");
                }
                prompter.say(&format!("shipped {tracking} for {rate}"));
            }
            Err(e) => {
                summary.failed += 1;
                prompter.say(&format!("shipment failed at '{}': {e}", e.stage()));
                if e.postage_charged() {
                    summary.charged = summary.charged + rate;
                    prompter.say(&format!(
                        "postage of {rate} was charged and NOT refunded; refund it manually"
                    ));
                } else {
                    prompter.say("no postage was charged");
                }
            }
        }
    }

    tracing::info!(
        shipped = summary.shipped,
        failed = summary.failed,
        charged = %summary.charged,
        "session finished"
    );
    Ok(summary)
}

/// Connects to the configured services and runs a session in `mode`.
#[tracing::instrument(skip(config, prompter))]
pub async fn run(
    config: &Config,
    mode: Mode,
    prompter: &mut dyn Prompter,
) -> Result<SessionSummary> {
    let postage =
        EasyPostClient::with_base_url(&config.postage.api_key, &config.postage.base_url)?;
    let server = HttpFulfillmentServer::new(&config.server.url, &config.server.api_key)?;
    let fetcher = HttpLabelFetcher::new()?;
    let printer = OutputPrinter::from_config(&config.label);
    let saga = FulfillmentSaga::new(postage, server.clone(), fetcher, printer)
        .with_layout(label_layout(&config.label)?);

    let mut source: Box<dyn ShipmentSource> = match mode {
        Mode::Bulk => Box::new(BulkSource::load(server).await?),
        Mode::Individual => Box::new(IndividualSource::new(IdentifierResolver::new(server))),
        Mode::Manual => {
            let maps = GoogleMapsClient::with_base_url(
                config.geocoding_api_key()?,
                &config.geocoding.base_url,
            )?;
            Box::new(ManualSource::new(
                Arc::new(maps),
                config.geocoding.completion(),
            ))
        }
    };

    tracing::info!(%mode, "session started");
    ship(&saga, source.as_mut(), prompter).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let summary = SessionSummary {
            shipped: 3,
            failed: 1,
            charged: Money::from_cents(1440),
        };
        assert_eq!(summary.to_string(), "3 shipped, 1 failed, $14.40 charged");
    }

    #[test]
    fn test_printer_follows_output_dir() {
        let mut config = LabelConfig::default();
        assert!(matches!(
            OutputPrinter::from_config(&config),
            OutputPrinter::Viewer(_)
        ));

        config.output_dir = Some("labels".into());
        assert!(matches!(
            OutputPrinter::from_config(&config),
            OutputPrinter::Directory(_)
        ));
    }

    #[test]
    fn test_missing_logo_is_an_error() {
        let config = LabelConfig {
            logo: Some("/nonexistent/logo.png".into()),
            ..LabelConfig::default()
        };
        assert!(label_layout(&config).is_err());
        assert!(!label_layout(&LabelConfig::default()).unwrap().has_logo());
    }
}
