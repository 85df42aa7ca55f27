//! Unit lookup for bulk shipping.

use std::collections::BTreeMap;

use common::Jurisdiction;

use crate::error::ServerError;
use crate::services::server::{FulfillmentServer, Unit};

/// Default number of close matches offered for an unknown unit name.
pub const DEFAULT_SUGGESTIONS: usize = 4;

/// Units known to the fulfillment server.
///
/// Keyed by upper-cased name and jurisdiction: the same name may exist in
/// more than one jurisdiction.
#[derive(Debug, Clone, Default)]
pub struct UnitDirectory {
    units: BTreeMap<(String, Jurisdiction), Unit>,
}

impl UnitDirectory {
    pub fn new(units: impl IntoIterator<Item = Unit>) -> Self {
        let units = units
            .into_iter()
            .map(|unit| Unit::new(unit.jurisdiction, &unit.name))
            .map(|unit| ((unit.name.clone(), unit.jurisdiction), unit))
            .collect();
        Self { units }
    }

    /// Fetches every unit from the server.
    pub async fn load<S: FulfillmentServer + ?Sized>(server: &S) -> Result<Self, ServerError> {
        let units = server.list_units().await?;
        tracing::debug!(count = units.len(), "loaded units");
        Ok(Self::new(units))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns every unit with this name, ignoring case and surrounding
    /// whitespace, in jurisdiction order.
    pub fn get(&self, name: &str) -> Vec<&Unit> {
        let name = name.trim().to_uppercase();
        self.units.values().filter(|unit| unit.name == name).collect()
    }

    /// Returns up to `limit` unit names closest to `query`, best first.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&Unit> {
        let query = query.trim().to_uppercase();
        let mut scored: Vec<(f64, &Unit)> = self
            .units
            .values()
            .map(|unit| (similarity(&query, &unit.name), unit))
            .collect();
        // Stable sort keeps alphabetical order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, unit)| unit).collect()
    }
}

/// Similarity in `[0, 1]`: twice the longest common subsequence over the total length.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    2.0 * previous[b.len()] as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::server::InMemoryFulfillmentServer;
    use common::Address;

    fn directory() -> UnitDirectory {
        UnitDirectory::new([
            Unit::new(Jurisdiction::Texas, "Coffield"),
            Unit::new(Jurisdiction::Texas, "Connally"),
            Unit::new(Jurisdiction::Texas, "San Angelo Work Camp"),
            Unit::new(Jurisdiction::Texas, "Beto"),
            Unit::new(Jurisdiction::Federal, "FCI Bastrop"),
            Unit::new(Jurisdiction::Texas, "Clements"),
        ])
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let units = directory();
        assert_eq!(units.len(), 6);
        assert_eq!(
            units.get("coffield"),
            vec![&Unit::new(Jurisdiction::Texas, "Coffield")]
        );
        assert_eq!(units.get(" fci bastrop ")[0].jurisdiction, Jurisdiction::Federal);
        assert!(units.get("nowhere").is_empty());
    }

    #[test]
    fn test_same_name_in_both_jurisdictions() {
        let units = UnitDirectory::new([
            Unit::new(Jurisdiction::Texas, "Bastrop"),
            Unit::new(Jurisdiction::Federal, "Bastrop"),
        ]);
        assert_eq!(units.len(), 2);

        let matches: Vec<Jurisdiction> = units
            .get("bastrop")
            .into_iter()
            .map(|u| u.jurisdiction)
            .collect();
        assert_eq!(matches, vec![Jurisdiction::Texas, Jurisdiction::Federal]);
        assert_eq!(units.suggest("bastrp", 4).len(), 2);
    }

    #[test]
    fn test_suggest_ranks_close_names_first() {
        let units = directory();
        let suggestions: Vec<&str> = units
            .suggest("cofield", DEFAULT_SUGGESTIONS)
            .into_iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(suggestions.len(), 4);
        assert_eq!(suggestions[0], "COFFIELD");
    }

    #[test]
    fn test_suggest_respects_limit() {
        assert_eq!(directory().suggest("x", 2).len(), 2);
        assert!(UnitDirectory::default().suggest("x", 4).is_empty());
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("BETO", "BETO"), 1.0);
        assert_eq!(similarity("ABC", "XYZ"), 0.0);
        assert!(similarity("COFIELD", "COFFIELD") > similarity("COFIELD", "CONNALLY"));
    }

    #[tokio::test]
    async fn test_load_from_server() {
        let server = InMemoryFulfillmentServer::new().with_unit(
            Unit::new(Jurisdiction::Texas, "Beto"),
            Address::new("Beto Unit", "1391 FM 3328", "Tennessee Colony", "TX", "75880"),
        );
        let units = UnitDirectory::load(&server).await.unwrap();
        assert!(units.get("BETO").is_some());
    }
}
