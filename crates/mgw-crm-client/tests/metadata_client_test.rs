//! Contract tests for MetadataClient: option-set label resolution,
//! caching, and miss semantics.

use mgw_crm_client::{CrmClient, CrmConfig};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

fn test_client(mock_server: &MockServer) -> CrmClient {
    let config = CrmConfig {
        base_url: mock_server.uri().parse().unwrap(),
        api_token: Zeroizing::new("test-token".into()),
        timeout_secs: 5,
    };
    CrmClient::new(config).unwrap()
}

fn gender_metadata() -> serde_json::Value {
    serde_json::json!({
        "LogicalName": "gendercode",
        "OptionSet": {
            "Options": [
                {"Value": 1, "Label": {"UserLocalizedLabel": {"Label": "Male"}}},
                {"Value": 2, "Label": {"UserLocalizedLabel": {"Label": "Female"}}},
                {"Value": 3, "Label": {"UserLocalizedLabel": {"Label": "Prefer not to say"}}}
            ]
        }
    })
}

#[tokio::test]
async fn resolves_label_to_value() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/data/v9\.2/EntityDefinitions.*gendercode.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gender_metadata()))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let value = client
        .metadata()
        .option_value("contact", "gendercode", "Female")
        .await
        .unwrap();
    assert_eq!(value, Some(2));
}

#[tokio::test]
async fn resolution_is_case_insensitive() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/data/v9\.2/EntityDefinitions.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gender_metadata()))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let value = client
        .metadata()
        .option_value("contact", "gendercode", "  male ")
        .await
        .unwrap();
    assert_eq!(value, Some(1));
}

#[tokio::test]
async fn unknown_label_resolves_to_none_not_zero() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/data/v9\.2/EntityDefinitions.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gender_metadata()))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let value = client
        .metadata()
        .option_value("contact", "gendercode", "Diverse")
        .await
        .unwrap();
    // A miss is None — callers must not treat it as option value 0.
    assert_eq!(value, None);
}

#[tokio::test]
async fn second_lookup_is_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/data/v9\.2/EntityDefinitions.*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gender_metadata()))
        .expect(1) // exactly one metadata round-trip
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let first = client
        .metadata()
        .option_value("contact", "gendercode", "Male")
        .await
        .unwrap();
    let second = client
        .metadata()
        .option_value("contact", "gendercode", "Female")
        .await
        .unwrap();
    assert_eq!(first, Some(1));
    assert_eq!(second, Some(2));
}

#[tokio::test]
async fn metadata_error_is_surfaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/data/v9\.2/EntityDefinitions.*"))
        .respond_with(ResponseTemplate::new(404).set_body_string("attribute not found"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client
        .metadata()
        .option_value("contact", "nosuchcolumn", "Male")
        .await;
    match result.unwrap_err() {
        mgw_crm_client::CrmError::ApiError { status, .. } => assert_eq!(status, 404),
        other => panic!("expected ApiError, got: {other:?}"),
    }
}
