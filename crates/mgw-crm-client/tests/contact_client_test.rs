//! Contract tests for ContactClient against the Dataverse Web API shapes.
//!
//! These tests use wiremock to simulate the organization's Web API.
//! Paths, filters, and response shapes match the `api/data/v9.2` OData
//! conventions the gateway is deployed against.

use mgw_crm_client::contacts::{ContactUpdate, NewContact};
use mgw_crm_client::{CrmClient, CrmConfig};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

/// Build a CrmClient pointed at a wiremock server.
fn test_client(mock_server: &MockServer) -> CrmClient {
    let config = CrmConfig {
        base_url: mock_server.uri().parse().unwrap(),
        api_token: Zeroizing::new("test-token".into()),
        timeout_secs: 5,
    };
    CrmClient::new(config).unwrap()
}

fn contact_body(id: &str, email: &str) -> serde_json::Value {
    serde_json::json!({
        "contactid": id,
        "emailaddress1": email,
        "firstname": "Alice",
        "lastname": "Lee",
        "mobilephone": "+85291234567",
        "wkcda_mastercustomerid": "P17234567890123",
        "wkcda_emarketingconsent": true
    })
}

// ── GET /contacts (lookups) ──────────────────────────────────────────

#[tokio::test]
async fn find_by_email_sends_filter_and_parses_contact() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .and(query_param("$filter", "emailaddress1 eq 'alice@example.com'"))
        .and(query_param("$top", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [contact_body("550e8400-e29b-41d4-a716-446655440000", "alice@example.com")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let contact = client
        .contacts()
        .find_by_email("alice@example.com")
        .await
        .unwrap();

    let contact = contact.expect("contact should be found");
    assert_eq!(contact.email.as_deref(), Some("alice@example.com"));
    assert_eq!(
        contact.master_customer_id.as_deref(),
        Some("P17234567890123")
    );
    assert_eq!(contact.e_marketing_consent, Some(true));
}

#[tokio::test]
async fn find_by_email_escapes_single_quotes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .and(query_param(
            "$filter",
            "emailaddress1 eq 'o''brien@example.com'",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let contact = client
        .contacts()
        .find_by_email("o'brien@example.com")
        .await
        .unwrap();
    assert!(contact.is_none());
}

#[tokio::test]
async fn find_by_email_or_phone_builds_or_filter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .and(query_param(
            "$filter",
            "(emailaddress1 eq 'bob@example.com' or mobilephone eq '+85291234567')",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [contact_body("550e8400-e29b-41d4-a716-446655440001", "bob@example.com")]
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let contact = client
        .contacts()
        .find_by_email_or_phone("bob@example.com", "+85291234567")
        .await
        .unwrap();
    assert!(contact.is_some());
}

#[tokio::test]
async fn find_returns_none_on_empty_result() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": []})))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let contact = client
        .contacts()
        .find_by_master_customer_id("P17234567890123")
        .await
        .unwrap();
    assert!(contact.is_none());
}

#[tokio::test]
async fn find_surfaces_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client.contacts().find_by_email("x@example.com").await;
    match result.unwrap_err() {
        mgw_crm_client::CrmError::ApiError { status, .. } => assert_eq!(status, 500),
        other => panic!("expected ApiError, got: {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_is_flagged_as_authorization_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let err = client
        .contacts()
        .find_by_email("x@example.com")
        .await
        .unwrap_err();
    assert!(err.is_authorization_failure());
}

// ── POST /contacts ───────────────────────────────────────────────────

#[tokio::test]
async fn create_posts_logical_names_and_returns_representation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/data/v9.2/contacts"))
        .and(body_partial_json(serde_json::json!({
            "emailaddress1": "carol@example.com",
            "firstname": "Carol",
            "wkcda_mastercustomerid": "P17234567890124"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(contact_body(
            "550e8400-e29b-41d4-a716-446655440002",
            "carol@example.com",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let req = NewContact {
        email: "carol@example.com".into(),
        first_name: "Carol".into(),
        last_name: "Ng".into(),
        master_customer_id: "P17234567890124".into(),
        phone: None,
        birth_date: None,
        gender_value: Some(2),
        preferred_language_value: None,
        customer_source_value: None,
        e_marketing_consent: Some(false),
        pics_consent: None,
        photo_url: None,
        photo_data: None,
    };

    let created = client.contacts().create(&req).await.unwrap();
    assert_eq!(created.email.as_deref(), Some("carol@example.com"));
}

#[tokio::test]
async fn create_omits_absent_optional_columns() {
    // None fields must not appear in the payload at all — Dataverse
    // treats explicit nulls as column clears.
    let req = NewContact {
        email: "d@example.com".into(),
        first_name: "D".into(),
        last_name: "E".into(),
        master_customer_id: "P17234567890125".into(),
        phone: None,
        birth_date: None,
        gender_value: None,
        preferred_language_value: None,
        customer_source_value: None,
        e_marketing_consent: None,
        pics_consent: None,
        photo_url: None,
        photo_data: None,
    };
    let value = serde_json::to_value(&req).unwrap();
    let obj = value.as_object().unwrap();
    assert!(!obj.contains_key("mobilephone"));
    assert!(!obj.contains_key("gendercode"));
    assert!(!obj.contains_key("wkcda_photourl"));
    assert!(obj.contains_key("emailaddress1"));
}

// ── PATCH /contacts({id}) ────────────────────────────────────────────

#[tokio::test]
async fn update_patches_by_id() {
    let mock_server = MockServer::start().await;
    let id = "550e8400-e29b-41d4-a716-446655440003";

    Mock::given(method("PATCH"))
        .and(path(format!("/api/data/v9.2/contacts({id})")))
        .and(body_partial_json(serde_json::json!({
            "wkcda_emarketingconsent": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(contact_body(id, "alice@example.com")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let update = ContactUpdate {
        e_marketing_consent: Some(true),
        ..Default::default()
    };
    let updated = client
        .contacts()
        .update(id.parse().unwrap(), &update)
        .await
        .unwrap();
    assert_eq!(updated.email.as_deref(), Some("alice@example.com"));
}

// ── Serde resilience (forward compatibility) ─────────────────────────

#[tokio::test]
async fn contact_deserializes_with_unknown_and_missing_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/data/v9.2/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{
                "contactid": "550e8400-e29b-41d4-a716-446655440004",
                "emailaddress1": "minimal@example.com",
                "futurecolumn": "ignored"
            }]
        })))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let contact = client
        .contacts()
        .find_by_email("minimal@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contact.email.as_deref(), Some("minimal@example.com"));
    assert!(contact.first_name.is_none());
    assert!(contact.master_customer_id.is_none());
    assert!(contact.birth_date.is_none());
}
