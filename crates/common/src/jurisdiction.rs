//! Jurisdictions partitioning inmate records.

use serde::{Deserialize, Serialize};

/// An administrative domain whose inmate records are looked up separately.
///
/// The declaration order is the fixed query order used when a bare numeric
/// id has to be tried against every jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Jurisdiction {
    /// Texas state system.
    #[serde(rename = "TEX")]
    Texas,
    /// Federal system.
    #[serde(rename = "FED")]
    Federal,
}

impl Jurisdiction {
    /// Every jurisdiction, in query order.
    pub const ALL: [Jurisdiction; 2] = [Jurisdiction::Texas, Jurisdiction::Federal];

    /// Returns the short code used in barcodes and server paths.
    pub fn code(&self) -> &'static str {
        match self {
            Jurisdiction::Texas => "TEX",
            Jurisdiction::Federal => "FED",
        }
    }

    /// Looks up a jurisdiction by code, ignoring case.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|j| j.code().eq_ignore_ascii_case(code))
    }

    /// Renders an inmate id the way this jurisdiction prints it on mail.
    pub fn format_inmate_id(&self, id: u64) -> String {
        match self {
            Jurisdiction::Texas => format!("{id:08}"),
            Jurisdiction::Federal => id.to_string(),
        }
    }
}

impl std::fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_order_is_fixed() {
        assert_eq!(Jurisdiction::ALL, [Jurisdiction::Texas, Jurisdiction::Federal]);
    }

    #[test]
    fn test_from_code_ignores_case() {
        assert_eq!(Jurisdiction::from_code("tex"), Some(Jurisdiction::Texas));
        assert_eq!(Jurisdiction::from_code("FED"), Some(Jurisdiction::Federal));
        assert_eq!(Jurisdiction::from_code("CAL"), None);
    }

    #[test]
    fn test_inmate_id_formatting() {
        assert_eq!(Jurisdiction::Texas.format_inmate_id(268601), "00268601");
        assert_eq!(Jurisdiction::Federal.format_inmate_id(12345678), "12345678");
    }

    #[test]
    fn test_serializes_as_code() {
        let json = serde_json::to_string(&Jurisdiction::Federal).unwrap();
        assert_eq!(json, "\"FED\"");
        let parsed: Jurisdiction = serde_json::from_str("\"TEX\"").unwrap();
        assert_eq!(parsed, Jurisdiction::Texas);
    }
}
