use std::io::Write;
use std::time::Duration;

use immich_slideshow::config::{Configuration, QueryKind, QueryMode};
use serde_json::json;

fn parse(yaml: &str) -> Configuration {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn parse_minimal_config_with_defaults() {
    let yaml = r#"
host: "http://photos.local:2283"
api-key: "secret"
"#;
    let cfg = parse(yaml);
    assert_eq!(cfg.host, "http://photos.local:2283");
    assert_eq!(cfg.api_key.expose(), "secret");
    assert_eq!(cfg.query, QueryMode::Random { count: None });
    assert_eq!(cfg.asset_count, 50);
    assert_eq!(cfg.rotation_interval, Duration::from_secs(30));
    assert_eq!(cfg.refresh_interval, Duration::from_secs(300));
    assert_eq!(cfg.thumbnail_timeout, Duration::from_secs(15));
    assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_humantime_intervals() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
rotation-interval: 1m 30s
refresh-interval: 2h
thumbnail-timeout: 500ms
"#;
    let cfg = parse(yaml);
    assert_eq!(cfg.rotation_interval, Duration::from_secs(90));
    assert_eq!(cfg.refresh_interval, Duration::from_secs(7200));
    assert_eq!(cfg.thumbnail_timeout, Duration::from_millis(500));
}

#[test]
fn parse_album_mode() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
query:
  mode: album
  album-id: "3f1c"
"#;
    let cfg = parse(yaml);
    assert_eq!(
        cfg.query,
        QueryMode::Album {
            album_id: Some("3f1c".into())
        }
    );
    assert_eq!(cfg.query.kind(), QueryKind::Album);
    assert_eq!(cfg.effective_count(), 50);
}

#[test]
fn album_mode_without_id_still_validates() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
query:
  mode: album
"#;
    let cfg = parse(yaml).validated().unwrap();
    assert_eq!(cfg.query, QueryMode::Album { album_id: None });
}

#[test]
fn parse_favorites_with_params_and_count() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
asset-count: 80
query:
  mode: favorites
  count: 25
  params:
    order: desc
"#;
    let cfg = parse(yaml);
    match &cfg.query {
        QueryMode::Favorites { count, params } => {
            assert_eq!(*count, Some(25));
            assert_eq!(params.get("order"), Some(&json!("desc")));
        }
        other => panic!("unexpected mode: {other:?}"),
    }
    assert_eq!(cfg.effective_count(), 25);
}

#[test]
fn parse_metadata_search_filters() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
query:
  mode: metadata-search
  filters:
    city: Lisbon
    isFavorite: true
"#;
    let cfg = parse(yaml);
    assert_eq!(cfg.query.kind(), QueryKind::MetadataSearch);
    let QueryMode::MetadataSearch { filters, count } = &cfg.query else {
        panic!("expected metadata search");
    };
    assert_eq!(*count, None);
    assert_eq!(filters.get("city"), Some(&json!("Lisbon")));
    assert_eq!(filters.get("isFavorite"), Some(&json!(true)));
}

#[test]
fn non_mapping_filters_are_rejected() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
query:
  mode: metadata-search
  filters: [city]
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn unknown_mode_is_rejected() {
    let yaml = r#"
host: "http://photos.local"
api-key: "k"
query:
  mode: shuffle
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn validation_trims_trailing_slash() {
    let yaml = r#"
host: "https://photos.example.com/immich/"
api-key: "k"
"#;
    let cfg = parse(yaml).validated().unwrap();
    assert_eq!(cfg.host, "https://photos.example.com/immich");
}

#[test]
fn validation_rejects_missing_host_and_key() {
    let no_host = parse("api-key: k\n");
    assert!(no_host.validated().is_err());

    let no_key = parse("host: http://photos.local\n");
    let err = no_key.validated().unwrap_err();
    assert!(err.to_string().contains("api-key"));
}

#[test]
fn validation_rejects_non_http_scheme() {
    let cfg = parse("host: ftp://photos.local\napi-key: k\n");
    assert!(cfg.validated().is_err());
}

#[test]
fn validation_rejects_out_of_range_counts() {
    let zero = parse("host: http://h\napi-key: k\nasset-count: 0\n");
    assert!(zero.validated().is_err());

    let too_many = parse(
        r#"
host: http://h
api-key: k
query:
  mode: random
  count: 501
"#,
    );
    assert!(too_many.validated().is_err());

    let edge = parse("host: http://h\napi-key: k\nasset-count: 500\n");
    assert!(edge.validated().is_ok());
}

#[test]
fn validation_rejects_out_of_range_intervals() {
    let fast = parse("host: http://h\napi-key: k\nrotation-interval: 2s\n");
    let err = fast.validated().unwrap_err();
    assert!(err.to_string().contains("rotation-interval"));

    let slow = parse("host: http://h\napi-key: k\nrefresh-interval: 2days\n");
    let err = slow.validated().unwrap_err();
    assert!(err.to_string().contains("refresh-interval"));

    let zero = parse("host: http://h\napi-key: k\nthumbnail-timeout: 0s\n");
    assert!(zero.validated().is_err());
}

#[test]
fn api_key_is_redacted_in_debug_output() {
    let cfg = parse("host: http://h\napi-key: very-secret\n");
    let printed = format!("{cfg:?}");
    assert!(!printed.contains("very-secret"));
}

#[test]
fn load_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "host: http://photos.local\napi-key: k\nquery:\n  mode: recent\n  count: 20"
    )
    .unwrap();
    let cfg = Configuration::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.query.kind(), QueryKind::Recent);
    assert_eq!(cfg.effective_count(), 20);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Configuration::from_yaml_file(dir.path().join("absent.yaml")).is_err());
}
