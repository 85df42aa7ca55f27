//! Integration tests for identifier resolution.

use common::{Address, Jurisdiction};
use fulfillment::{
    IdentifierResolver, InMemoryFulfillmentServer, InmateRecord, Provenance, RegistrationTarget,
    ResolutionResult, Unit,
};

fn inmate(jurisdiction: Jurisdiction, id: u64, first: &str, unit: &str) -> InmateRecord {
    InmateRecord {
        jurisdiction,
        id,
        first_name: first.to_string(),
        last_name: "Louis".to_string(),
        unit: unit.to_string(),
    }
}

fn server() -> InMemoryFulfillmentServer {
    InMemoryFulfillmentServer::new()
        .with_unit(
            Unit::new(Jurisdiction::Texas, "Coffield"),
            Address::new(
                "ATTN: Mailroom Staff",
                "2661 FM 2054",
                "Tennessee Colony",
                "TX",
                "75884",
            ),
        )
        .with_unit(
            Unit::new(Jurisdiction::Federal, "FCI Bastrop"),
            Address::new(
                "ATTN: Mailroom Staff",
                "1341 Highway 95 N",
                "Bastrop",
                "TX",
                "78602",
            ),
        )
}

#[tokio::test]
async fn test_numeric_id_in_one_jurisdiction_resolves() {
    let server = server().with_inmate(inmate(
        Jurisdiction::Federal,
        268601,
        "Timothy",
        "FCI BASTROP",
    ));
    let resolver = IdentifierResolver::new(server.clone());

    let result = resolver.resolve("268601").await.unwrap();

    let ResolutionResult::Resolved(resolution) = result else {
        panic!("expected Resolved, got {result:?}");
    };
    assert_eq!(
        resolution.provenance,
        Provenance::NumericId(Jurisdiction::Federal)
    );
    assert_eq!(resolution.address.name, "Timothy Louis #268601");
    assert_eq!(resolution.address.city, "Bastrop");
    assert_eq!(
        resolution.target(),
        RegistrationTarget::Inmate {
            jurisdiction: Jurisdiction::Federal,
            inmate_id: 268601
        }
    );
    // Every jurisdiction is queried, and the legacy endpoint is not
    assert_eq!(server.lookups(), vec!["TEX-268601", "FED-268601"]);
}

#[tokio::test]
async fn test_numeric_id_in_two_jurisdictions_is_ambiguous_in_query_order() {
    let server = server()
        .with_inmate(inmate(Jurisdiction::Federal, 1234, "Federal", "FCI BASTROP"))
        .with_inmate(inmate(Jurisdiction::Texas, 1234, "Texas", "COFFIELD"));
    let resolver = IdentifierResolver::new(server);

    let result = resolver.resolve("1234").await.unwrap();

    let ResolutionResult::Ambiguous(candidates) = result else {
        panic!("expected Ambiguous, got {result:?}");
    };
    let jurisdictions: Vec<Jurisdiction> = candidates.iter().map(|c| c.jurisdiction).collect();
    assert_eq!(jurisdictions, vec![Jurisdiction::Texas, Jurisdiction::Federal]);
    assert_eq!(candidates[0].address.name, "Texas Louis #00001234");
    assert_eq!(candidates[1].address.name, "Federal Louis #1234");
}

#[tokio::test]
async fn test_missing_barcode_falls_through_to_numeric_id() {
    let server = server().with_inmate(inmate(
        Jurisdiction::Federal,
        999999999,
        "Timothy",
        "FCI BASTROP",
    ));
    let resolver = IdentifierResolver::new(server.clone());

    let result = resolver.resolve("TEX-999999999-0").await.unwrap();

    let ResolutionResult::Resolved(resolution) = result else {
        panic!("expected Resolved, got {result:?}");
    };
    assert_eq!(
        resolution.provenance,
        Provenance::NumericId(Jurisdiction::Federal)
    );
    assert_eq!(
        server.lookups(),
        vec!["TEX-999999999", "FED-999999999"]
    );
}

#[tokio::test]
async fn test_missing_barcode_without_any_match_is_not_found() {
    let server = server();
    let resolver = IdentifierResolver::new(server.clone());

    let result = resolver.resolve("TEX-999999999-0").await.unwrap();

    assert_eq!(result, ResolutionResult::NotFound);
    // Barcode tokens never reach the legacy endpoint
    assert!(!server.lookups().iter().any(|l| l.starts_with("request-")));
}

#[tokio::test]
async fn test_barcode_hit_short_circuits() {
    let server = server()
        .with_inmate(inmate(Jurisdiction::Texas, 268601, "Timothy", "COFFIELD"))
        .with_inmate(inmate(Jurisdiction::Federal, 268601, "Other", "FCI BASTROP"));
    let resolver = IdentifierResolver::new(server.clone());

    let result = resolver.resolve("TEX-00268601-2").await.unwrap();

    let ResolutionResult::Resolved(resolution) = result else {
        panic!("expected Resolved, got {result:?}");
    };
    assert_eq!(resolution.provenance, Provenance::Barcode(Jurisdiction::Texas));
    assert_eq!(resolution.address.name, "Timothy Louis #00268601");
    assert_eq!(server.lookups(), vec!["TEX-268601"]);
}

#[tokio::test]
async fn test_unknown_numeric_id_tries_legacy_then_not_found() {
    let server = server();
    let resolver = IdentifierResolver::new(server.clone());

    let result = resolver.resolve("31337").await.unwrap();

    assert_eq!(result, ResolutionResult::NotFound);
    assert_eq!(server.lookups(), vec!["TEX-31337", "FED-31337", "request-31337"]);
}
