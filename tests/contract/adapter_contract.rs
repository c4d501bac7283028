//! Contract every registered adapter must honor, regardless of wire format.

use wxmerge_core::{
    AdapterRegistry, Field, ParseContext, SourceDescriptor, SourceErrorKind, SourceKind,
};

/// 2024-01-15T13:00:00Z.
const NOW: i64 = 1_705_323_600;

const GARBAGE: &[&str] = &[
    "",
    "null",
    "{}",
    "[]",
    "%%% 42 ~~~",
    "<html><body>502 Bad Gateway</body></html>",
    "☃ 天気 ÆØÅ 12/34",
    r#"{"obs":"nope","data":[null,1,"x"]}"#,
];

#[test]
fn registry_covers_every_source_type() {
    let registry = AdapterRegistry::default();
    assert_eq!(registry.kinds(), SourceKind::ALL.to_vec());
    for kind in SourceKind::ALL {
        let adapter = registry.get(kind.as_str()).expect("adapter registered");
        assert_eq!(adapter.kind(), kind);
    }
}

#[test]
fn garbage_never_panics_and_never_yields_valid_data() {
    let registry = AdapterRegistry::default();
    let ctx = ParseContext::new(NOW);
    for kind in registry.kinds() {
        let adapter = registry.get_kind(kind).expect("adapter registered");
        let source = SourceDescriptor::new(kind.as_str()).with_station("KSPB");
        for body in GARBAGE {
            let snapshot = adapter.parse(body, &source, &ctx);
            assert!(!snapshot.is_valid, "{kind} accepted garbage {body:?}");
            assert_eq!(snapshot.source, kind);
            assert!(Field::ALL
                .into_iter()
                .all(|field| snapshot.reading(field).value.is_none()));
        }
        assert!(
            adapter.try_parse("%%% 42 ~~~", &source, &ctx).is_err(),
            "{kind} must report unparseable payloads"
        );
    }
}

#[test]
fn missing_settings_are_configuration_errors() {
    let registry = AdapterRegistry::default();
    for kind in registry.kinds() {
        let adapter = registry.get_kind(kind).expect("adapter registered");
        let error = adapter
            .build_request(&SourceDescriptor::new(kind.as_str()), NOW)
            .expect_err("bare descriptor is incomplete");
        assert_eq!(error.kind(), SourceErrorKind::Configuration, "{kind}");
    }
}

#[test]
fn cadence_and_field_declarations_are_consistent() {
    for capabilities in AdapterRegistry::default().capabilities() {
        let kind = capabilities.kind;
        let cadence = capabilities.update_frequency_secs;
        let max_age = capabilities.max_acceptable_age_secs();
        assert!(cadence > 0, "{kind}");
        assert!(max_age > cadence, "{kind}");
        assert_eq!(max_age % cadence, 0, "{kind}");

        assert!(!capabilities.fields.is_empty(), "{kind}");
        assert!(
            capabilities
                .preferred_fields
                .iter()
                .all(|field| capabilities.fields.contains(field)),
            "{kind} prefers a field it never provides"
        );
        assert_eq!(capabilities.nearby_stations, kind.is_aviation_report(), "{kind}");
    }
}

#[test]
fn station_sources_do_not_claim_aviation_fields() {
    for capabilities in AdapterRegistry::default().capabilities() {
        if matches!(
            capabilities.kind,
            SourceKind::Tempest | SourceKind::Ambient | SourceKind::Ecowitt | SourceKind::Weatherlink
        ) {
            assert!(!capabilities.provides(Field::Visibility), "{}", capabilities.kind);
            assert!(!capabilities.provides(Field::Ceiling), "{}", capabilities.kind);
        }
    }
}
