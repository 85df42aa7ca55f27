//! Identifier resolution against the fulfillment server.
//!
//! Strategies run in a fixed order (barcode, numeric id, legacy request).
//! Each one either produces a final [`ResolutionResult`] or passes, and the
//! first result wins. Lookup misses inside a strategy are not errors; only a
//! connectivity failure aborts resolution.

use common::{Address, Jurisdiction};
use serde::Serialize;

use crate::error::ServerError;
use crate::identifier::Identifier;
use crate::services::server::{FulfillmentServer, InmateRecord, RegistrationTarget};

/// Which strategy produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    Barcode(Jurisdiction),
    NumericId(Jurisdiction),
    LegacyRequest(u64),
}

impl Provenance {
    /// Human-readable label for logs and prompts.
    pub fn label(&self) -> String {
        match self {
            Provenance::Barcode(j) => format!("barcode ({j})"),
            Provenance::NumericId(j) => format!("numeric id ({j})"),
            Provenance::LegacyRequest(id) => format!("legacy request {id}"),
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// A recipient resolved to a single mailing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Unit mailroom address with the inmate as addressee.
    pub address: Address,
    pub record: InmateRecord,
    pub provenance: Provenance,
}

impl Resolution {
    /// What the shipment should be registered against.
    pub fn target(&self) -> RegistrationTarget {
        match self.provenance {
            Provenance::LegacyRequest(request_id) => {
                RegistrationTarget::LegacyRequest { request_id }
            }
            Provenance::Barcode(_) | Provenance::NumericId(_) => RegistrationTarget::Inmate {
                jurisdiction: self.record.jurisdiction,
                inmate_id: self.record.id,
            },
        }
    }
}

/// One match of an ambiguous numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub jurisdiction: Jurisdiction,
    pub record: InmateRecord,
    pub address: Address,
}

impl Candidate {
    /// Turns the operator's choice into a resolution.
    pub fn into_resolution(self) -> Resolution {
        Resolution {
            address: self.address,
            record: self.record,
            provenance: Provenance::NumericId(self.jurisdiction),
        }
    }
}

/// Outcome of resolving one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolutionResult {
    Resolved(Resolution),
    /// Several jurisdictions matched; listed in query order.
    Ambiguous(Vec<Candidate>),
    NotFound,
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    Barcode,
    NumericId,
    LegacyRequest,
}

impl Strategy {
    const ORDER: [Strategy; 3] = [
        Strategy::Barcode,
        Strategy::NumericId,
        Strategy::LegacyRequest,
    ];

    fn name(self) -> &'static str {
        match self {
            Strategy::Barcode => "barcode",
            Strategy::NumericId => "numeric_id",
            Strategy::LegacyRequest => "legacy_request",
        }
    }
}

/// Resolves operator input to a recipient.
#[derive(Debug, Clone)]
pub struct IdentifierResolver<S> {
    server: S,
}

impl<S: FulfillmentServer> IdentifierResolver<S> {
    pub fn new(server: S) -> Self {
        Self { server }
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    /// Parses and resolves raw input.
    ///
    /// Empty input and unit names resolve to [`ResolutionResult::NotFound`].
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, raw: &str) -> Result<ResolutionResult, ServerError> {
        match Identifier::parse(raw) {
            Ok(identifier) => self.resolve_identifier(&identifier).await,
            Err(e) => {
                tracing::debug!(error = %e, "unparsable identifier");
                Ok(ResolutionResult::NotFound)
            }
        }
    }

    /// Resolves a parsed identifier.
    pub async fn resolve_identifier(
        &self,
        identifier: &Identifier,
    ) -> Result<ResolutionResult, ServerError> {
        for strategy in Strategy::ORDER {
            if let Some(result) = self.attempt(strategy, identifier).await? {
                tracing::debug!(strategy = strategy.name(), %identifier, "identifier matched");
                return Ok(result);
            }
        }
        tracing::debug!(%identifier, "identifier not found");
        Ok(ResolutionResult::NotFound)
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        identifier: &Identifier,
    ) -> Result<Option<ResolutionResult>, ServerError> {
        match strategy {
            Strategy::Barcode => self.by_barcode(identifier).await,
            Strategy::NumericId => self.by_numeric_id(identifier).await,
            Strategy::LegacyRequest => self.by_legacy_request(identifier).await,
        }
    }

    async fn by_barcode(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<ResolutionResult>, ServerError> {
        let Identifier::Barcode {
            jurisdiction,
            inmate_id,
            ..
        } = identifier
        else {
            return Ok(None);
        };

        let found = self.lookup(*jurisdiction, *inmate_id).await?;
        Ok(found.map(|candidate| {
            ResolutionResult::Resolved(Resolution {
                address: candidate.address,
                record: candidate.record,
                provenance: Provenance::Barcode(*jurisdiction),
            })
        }))
    }

    async fn by_numeric_id(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<ResolutionResult>, ServerError> {
        let Some(id) = identifier.numeric_candidate() else {
            return Ok(None);
        };
        // A barcode's own jurisdiction already missed
        let tried = match identifier {
            Identifier::Barcode { jurisdiction, .. } => Some(*jurisdiction),
            _ => None,
        };

        let mut candidates = Vec::new();
        for jurisdiction in Jurisdiction::ALL {
            if tried == Some(jurisdiction) {
                continue;
            }
            if let Some(candidate) = self.lookup(jurisdiction, id).await? {
                candidates.push(candidate);
            }
        }

        Ok(match candidates.len() {
            0 => None,
            1 => candidates
                .pop()
                .map(|candidate| ResolutionResult::Resolved(candidate.into_resolution())),
            _ => Some(ResolutionResult::Ambiguous(candidates)),
        })
    }

    async fn by_legacy_request(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<ResolutionResult>, ServerError> {
        let Some(request_id) = identifier.legacy_candidate() else {
            return Ok(None);
        };

        let Some(record) = miss_as_none(
            self.server
                .get_inmate_by_legacy_request(request_id)
                .await,
        )?
        else {
            return Ok(None);
        };
        let Some(address) = self.mailing_address(&record).await? else {
            return Ok(None);
        };

        Ok(Some(ResolutionResult::Resolved(Resolution {
            address,
            record,
            provenance: Provenance::LegacyRequest(request_id),
        })))
    }

    /// Looks up one inmate and their mailing address; a miss at either step is `None`.
    async fn lookup(
        &self,
        jurisdiction: Jurisdiction,
        id: u64,
    ) -> Result<Option<Candidate>, ServerError> {
        let Some(record) = miss_as_none(self.server.get_inmate(jurisdiction, id).await)? else {
            return Ok(None);
        };
        let Some(address) = self.mailing_address(&record).await? else {
            return Ok(None);
        };
        Ok(Some(Candidate {
            jurisdiction,
            record,
            address,
        }))
    }

    async fn mailing_address(&self, record: &InmateRecord) -> Result<Option<Address>, ServerError> {
        let unit = miss_as_none(
            self.server
                .get_unit_address(record.jurisdiction, &record.unit)
                .await,
        )?;
        Ok(unit.map(|address| address.with_name(record.addressee())))
    }
}

/// Turns a non-fatal lookup failure into `None`.
fn miss_as_none<T>(result: Result<T, ServerError>) -> Result<Option<T>, ServerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "lookup missed");
            Ok(None)
        }
    }
}
