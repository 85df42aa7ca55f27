//! Recipient identifiers typed or scanned by an operator.

use std::str::FromStr;

use common::{Jurisdiction, ValidationError};
use serde::{Deserialize, Serialize};

/// Separator between the parts of a barcode.
pub const BARCODE_SEPARATOR: char = '-';

/// A parsed recipient identifier.
///
/// Produced once by [`Identifier::parse`]; resolution matches on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identifier {
    /// `TEX-00268601-3`: jurisdiction, inmate id and an optional sequence index.
    ///
    /// The index is parsed but never used for lookup.
    Barcode {
        jurisdiction: Jurisdiction,
        inmate_id: u64,
        index: Option<u32>,
    },

    /// A bare number that may be an inmate id in any jurisdiction or a legacy
    /// request id.
    NumericId(u64),

    /// A number known to be a legacy request id, such as one read from a
    /// request slip.
    ///
    /// [`Identifier::parse`] never produces it, since typed numbers are
    /// ambiguous. Callers that know the token's kind build it directly and
    /// pass it to [`crate::IdentifierResolver::resolve_identifier`], which
    /// then skips the jurisdiction lookups.
    LegacyRequestId(u64),

    /// Anything else, taken as a unit name (upper-cased).
    UnitName(String),
}

impl Identifier {
    /// Parses raw operator input.
    ///
    /// A token starting with a known jurisdiction code and `-` whose remaining
    /// parts are digits is a barcode. A token of digits only is a numeric id.
    /// Anything else non-empty is a unit name.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(ValidationError::EmptyIdentifier);
        }

        if let Some(barcode) = parse_barcode(token) {
            return Ok(barcode);
        }
        if is_digits(token) {
            if let Ok(value) = token.parse::<u64>() {
                return Ok(Identifier::NumericId(value));
            }
        }
        Ok(Identifier::UnitName(token.to_uppercase()))
    }

    /// Returns the number the numeric-id strategy should try for this token.
    ///
    /// For a barcode whose lookup missed, that is its inmate id.
    pub fn numeric_candidate(&self) -> Option<u64> {
        match self {
            Identifier::Barcode { inmate_id, .. } => Some(*inmate_id),
            Identifier::NumericId(value) => Some(*value),
            Identifier::LegacyRequestId(_) | Identifier::UnitName(_) => None,
        }
    }

    /// Returns the id the legacy-request strategy should try.
    ///
    /// Only tokens that were entirely numeric qualify.
    pub fn legacy_candidate(&self) -> Option<u64> {
        match self {
            Identifier::NumericId(value) | Identifier::LegacyRequestId(value) => Some(*value),
            Identifier::Barcode { .. } | Identifier::UnitName(_) => None,
        }
    }
}

impl FromStr for Identifier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identifier::Barcode {
                jurisdiction,
                inmate_id,
                index: Some(index),
            } => write!(f, "{jurisdiction}-{inmate_id}-{index}"),
            Identifier::Barcode {
                jurisdiction,
                inmate_id,
                index: None,
            } => write!(f, "{jurisdiction}-{inmate_id}"),
            Identifier::NumericId(value) => write!(f, "{value}"),
            Identifier::LegacyRequestId(value) => write!(f, "request {value}"),
            Identifier::UnitName(name) => f.write_str(name),
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_barcode(token: &str) -> Option<Identifier> {
    let (prefix, rest) = token.split_once(BARCODE_SEPARATOR)?;
    let jurisdiction = Jurisdiction::from_code(prefix)?;

    let mut parts = rest.split(BARCODE_SEPARATOR);
    let id_part = parts.next()?;
    let index_part = parts.next();
    if parts.next().is_some() || !is_digits(id_part) {
        return None;
    }

    let inmate_id = id_part.parse().ok()?;
    let index = match index_part {
        Some(part) if is_digits(part) => Some(part.parse().ok()?),
        Some(_) => return None,
        None => None,
    };

    Some(Identifier::Barcode {
        jurisdiction,
        inmate_id,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_barcode_with_index() {
        assert_eq!(
            Identifier::parse("TEX-00268601-3").unwrap(),
            Identifier::Barcode {
                jurisdiction: Jurisdiction::Texas,
                inmate_id: 268601,
                index: Some(3),
            }
        );
    }

    #[test]
    fn test_parse_barcode_without_index() {
        assert_eq!(
            Identifier::parse(" fed-12345 ").unwrap(),
            Identifier::Barcode {
                jurisdiction: Jurisdiction::Federal,
                inmate_id: 12345,
                index: None,
            }
        );
    }

    #[test]
    fn test_parse_numeric() {
        assert_eq!(
            Identifier::parse("00268601").unwrap(),
            Identifier::NumericId(268601)
        );
    }

    #[test]
    fn test_malformed_barcode_is_unit_name() {
        assert_eq!(
            Identifier::parse("TEX-12a").unwrap(),
            Identifier::UnitName("TEX-12A".into())
        );
        assert_eq!(
            Identifier::parse("TEX-1-2-3").unwrap(),
            Identifier::UnitName("TEX-1-2-3".into())
        );
        assert_eq!(
            Identifier::parse("ABC-123").unwrap(),
            Identifier::UnitName("ABC-123".into())
        );
    }

    #[test]
    fn test_unit_name_is_upper_cased() {
        assert_eq!(
            Identifier::parse("Coffield").unwrap(),
            Identifier::UnitName("COFFIELD".into())
        );
    }

    #[test]
    fn test_empty_is_rejected() {
        assert_eq!(
            Identifier::parse("   "),
            Err(ValidationError::EmptyIdentifier)
        );
    }

    #[test]
    fn test_oversized_number_is_not_numeric() {
        let token = "99999999999999999999999";
        assert_eq!(
            Identifier::parse(token).unwrap(),
            Identifier::UnitName(token.into())
        );
    }

    #[test]
    fn test_candidates() {
        let barcode = Identifier::parse("TEX-999999999-0").unwrap();
        assert_eq!(barcode.numeric_candidate(), Some(999999999));
        assert_eq!(barcode.legacy_candidate(), None);

        let numeric = Identifier::parse("42").unwrap();
        assert_eq!(numeric.numeric_candidate(), Some(42));
        assert_eq!(numeric.legacy_candidate(), Some(42));

        let unit = Identifier::parse("coffield").unwrap();
        assert_eq!(unit.numeric_candidate(), None);
    }

    #[test]
    fn test_display_round_trips_barcode() {
        let id = Identifier::parse("TEX-268601-3").unwrap();
        assert_eq!(id.to_string(), "TEX-268601-3");
        assert_eq!(id.to_string().parse::<Identifier>().unwrap(), id);
    }
}
