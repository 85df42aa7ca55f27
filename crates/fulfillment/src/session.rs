//! Interactive shipment sources.
//!
//! A [`ShipmentSource`] is pulled once per shipment and answers with the
//! next destination, weight and registration target, or `None` when the
//! operator ends the session. Invalid input re-prompts; it never ends the
//! session.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Address, Weight};

use crate::completion::{CompletionCache, CompletionConfig, CompletionSession};
use crate::error::{ServerError, SessionError};
use crate::resolver::{IdentifierResolver, Resolution, ResolutionResult};
use crate::services::geocoding::GeocodingProvider;
use crate::services::server::{FulfillmentServer, RegistrationTarget};
use crate::units::{DEFAULT_SUGGESTIONS, UnitDirectory};

/// Operator input and output.
#[async_trait]
pub trait Prompter: Send {
    /// Asks a question; `None` means input has ended.
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>>;

    /// Shows a message.
    fn say(&mut self, message: &str);

    /// Lists numbered options and asks for one until a valid index is given.
    ///
    /// Returns the zero-based index, or `None` when input ends.
    async fn choose(&mut self, question: &str, options: &[String]) -> io::Result<Option<usize>> {
        for (index, option) in options.iter().enumerate() {
            self.say(&format!("[{}] : {option}", index + 1));
        }
        let prompt = format!("{question} [1 - {}]:", options.len());
        loop {
            let Some(answer) = self.ask(&prompt).await? else {
                return Ok(None);
            };
            match answer.trim().parse::<usize>() {
                Ok(choice) if (1..=options.len()).contains(&choice) => {
                    return Ok(Some(choice - 1));
                }
                _ => self.say("bad input: invalid index given"),
            }
        }
    }
}

/// Prompter that replays canned answers and records everything shown.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    transcript: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, T>(answers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            transcript: Vec::new(),
        }
    }

    /// Questions asked and messages shown, in order.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Answers not consumed yet.
    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.transcript.push(question.to_string());
        Ok(self.answers.pop_front())
    }

    fn say(&mut self, message: &str) {
        self.transcript.push(message.to_string());
    }
}

/// One shipment to fulfill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRequest {
    pub to_address: Address,
    pub weight: Weight,
    /// `None` for manual shipments.
    pub registration: Option<RegistrationTarget>,
}

/// Pull-based producer of shipment requests.
#[async_trait]
pub trait ShipmentSource: Send {
    /// Returns the next request, or `None` when the operator is done.
    async fn next(
        &mut self,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<ShipmentRequest>, SessionError>;
}

/// Asks for a weight in whole pounds until a valid one is given.
pub async fn ask_weight(prompter: &mut dyn Prompter) -> io::Result<Option<Weight>> {
    loop {
        let Some(answer) = prompter.ask("Enter weight in pounds:").await? else {
            return Ok(None);
        };
        match answer.parse::<Weight>() {
            Ok(weight) => return Ok(Some(weight)),
            Err(e) => prompter.say(&format!("bad input: {e}")),
        }
    }
}

/// Passes lookup misses back to the operator; connectivity failures end the session.
fn retryable<T>(
    prompter: &mut dyn Prompter,
    result: Result<T, ServerError>,
) -> Result<Option<T>, SessionError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(SessionError::Server(e)),
        Err(e) => {
            prompter.say(&format!("bad input: {e}"));
            Ok(None)
        }
    }
}

/// Bulk shipments to unit mailrooms.
pub struct BulkSource<S> {
    server: S,
    units: UnitDirectory,
}

impl<S: FulfillmentServer> BulkSource<S> {
    pub fn new(server: S, units: UnitDirectory) -> Self {
        Self { server, units }
    }

    /// Fetches the unit list and builds the source.
    pub async fn load(server: S) -> Result<Self, ServerError> {
        let units = UnitDirectory::load(&server).await?;
        Ok(Self::new(server, units))
    }

    pub fn units(&self) -> &UnitDirectory {
        &self.units
    }
}

#[async_trait]
impl<S: FulfillmentServer> ShipmentSource for BulkSource<S> {
    async fn next(
        &mut self,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<ShipmentRequest>, SessionError> {
        loop {
            let Some(query) = prompter.ask("Enter name of unit:").await? else {
                return Ok(None);
            };

            // The same name may exist in several jurisdictions
            let exact = self.units.get(&query);
            let unit = match exact.len() {
                1 => exact[0].clone(),
                _ => {
                    let matches = if exact.is_empty() {
                        self.units.suggest(&query, DEFAULT_SUGGESTIONS)
                    } else {
                        exact
                    };
                    if matches.is_empty() {
                        prompter.say("bad input: no units available");
                        continue;
                    }
                    let labels: Vec<String> = matches.iter().map(ToString::to_string).collect();
                    let Some(choice) = prompter.choose("Choose", &labels).await? else {
                        return Ok(None);
                    };
                    matches[choice].clone()
                }
            };

            let address = self
                .server
                .get_unit_address(unit.jurisdiction, &unit.name)
                .await;
            let Some(address) = retryable(prompter, address)? else {
                continue;
            };

            let Some(weight) = ask_weight(prompter).await? else {
                return Ok(None);
            };
            return Ok(Some(ShipmentRequest {
                to_address: address,
                weight,
                registration: Some(RegistrationTarget::unit(&unit)),
            }));
        }
    }
}

/// Individual shipments identified by a scanned or typed id.
pub struct IndividualSource<S> {
    resolver: IdentifierResolver<S>,
}

impl<S: FulfillmentServer> IndividualSource<S> {
    pub fn new(resolver: IdentifierResolver<S>) -> Self {
        Self { resolver }
    }

    async fn pick(
        &self,
        prompter: &mut dyn Prompter,
        raw: &str,
    ) -> Result<Option<Resolution>, SessionError> {
        match self.resolver.resolve(raw).await? {
            ResolutionResult::Resolved(resolution) => Ok(Some(resolution)),
            ResolutionResult::Ambiguous(candidates) => {
                prompter.say(&format!("'{raw}' matches more than one inmate"));
                let options: Vec<String> = candidates
                    .iter()
                    .map(|c| {
                        format!(
                            "{}: {} ({})",
                            c.jurisdiction,
                            c.record.addressee(),
                            c.record.unit
                        )
                    })
                    .collect();
                let choice = prompter.choose("Choose", &options).await?;
                Ok(choice
                    .and_then(|index| candidates.into_iter().nth(index))
                    .map(|candidate| candidate.into_resolution()))
            }
            ResolutionResult::NotFound => {
                prompter.say(&format!("bad input: no recipient found for '{raw}'"));
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<S: FulfillmentServer> ShipmentSource for IndividualSource<S> {
    async fn next(
        &mut self,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<ShipmentRequest>, SessionError> {
        loop {
            let Some(raw) = prompter.ask("Please scan request ID:").await? else {
                return Ok(None);
            };
            let Some(resolution) = self.pick(prompter, &raw).await? else {
                continue;
            };
            tracing::info!(
                provenance = %resolution.provenance,
                inmate = %resolution.record.addressee(),
                "recipient resolved"
            );
            prompter.say(&format!(
                "Shipping to {} (matched by {})",
                resolution.address.name, resolution.provenance
            ));

            let Some(weight) = ask_weight(prompter).await? else {
                return Ok(None);
            };
            return Ok(Some(ShipmentRequest {
                registration: Some(resolution.target()),
                to_address: resolution.address,
                weight,
            }));
        }
    }
}

/// Manual shipments to any US address, entered with completion help.
///
/// Addresses arrive as whole submitted lines, so no newer input can
/// supersede a request: completions are fetched without a debounce.
pub struct ManualSource<G> {
    geocoder: Arc<G>,
    completer: CompletionCache<G>,
}

impl<G: GeocodingProvider> ManualSource<G> {
    /// `config.debounce` is ignored; see [`CompletionCache::spawn_completions`]
    /// for keystroke-driven completion.
    pub fn new(geocoder: Arc<G>, config: CompletionConfig) -> Self {
        let config = CompletionConfig {
            debounce: Duration::ZERO,
            ..config
        };
        let completer =
            CompletionCache::new(Arc::clone(&geocoder), CompletionSession::new(), config);
        Self {
            geocoder,
            completer,
        }
    }

    /// Lets the operator pick a completion, or keeps the text as typed.
    async fn complete(
        &self,
        prompter: &mut dyn Prompter,
        text: String,
    ) -> io::Result<Option<String>> {
        let suggestions = self.completer.get_completions(&text).await;
        if suggestions.is_empty() {
            return Ok(Some(text));
        }

        let mut options: Vec<String> = suggestions.into_iter().map(|s| s.text).collect();
        options.push(format!("{text} (as typed)"));
        let Some(choice) = prompter.choose("Choose address", &options).await? else {
            return Ok(None);
        };
        if choice + 1 == options.len() {
            Ok(Some(text))
        } else {
            Ok(Some(options.swap_remove(choice)))
        }
    }
}

#[async_trait]
impl<G: GeocodingProvider> ShipmentSource for ManualSource<G> {
    async fn next(
        &mut self,
        prompter: &mut dyn Prompter,
    ) -> Result<Option<ShipmentRequest>, SessionError> {
        loop {
            let Some(text) = prompter.ask("Enter address:").await? else {
                return Ok(None);
            };
            let text = text.trim().to_string();
            if text.is_empty() {
                continue;
            }
            let Some(chosen) = self.complete(prompter, text).await? else {
                return Ok(None);
            };

            let geocoded = match self.geocoder.geocode(&chosen).await {
                Ok(Some(geocoded)) => geocoded,
                Ok(None) => {
                    prompter.say(&format!("bad input: could not find '{chosen}'"));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "geocoding failed");
                    prompter.say(&format!("bad input: could not look up '{chosen}'"));
                    continue;
                }
            };

            let Some(name) = prompter.ask("Enter addressee name:").await? else {
                return Ok(None);
            };
            let address = match geocoded.into_address(name.trim()) {
                Ok(address) => address,
                Err(e) => {
                    prompter.say(&format!("bad input: {e}"));
                    continue;
                }
            };

            let Some(weight) = ask_weight(prompter).await? else {
                return Ok(None);
            };
            return Ok(Some(ShipmentRequest {
                to_address: address,
                weight,
                registration: None,
            }));
        }
    }
}
