//! Contract tests for TransactionClient: single payments and
//! `CreateMultiple` batches.

use chrono::NaiveDate;
use mgw_crm_client::transactions::{NewGift, NewPayment};
use mgw_crm_client::{CrmClient, CrmConfig};
use wiremock::matchers::{body_partial_json, method, path};
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

fn gift(amount: f64) -> NewGift {
    NewGift {
        donor_bind: "/contacts(550e8400-e29b-41d4-a716-446655440000)".into(),
        amount,
        gift_type_value: 1,
        campaign_code: Some("ANNUAL2026".into()),
        receipt_required: Some(true),
        transaction_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
    }
}

// ── POST /wkcda_paymenttransactions ──────────────────────────────────

#[tokio::test]
async fn create_payment_posts_amounts_and_option_values() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/data/v9.2/wkcda_paymenttransactions"))
        .and(body_partial_json(serde_json::json!({
            "wkcda_amount": 880.0,
            "wkcda_paymenttype": 4,
            "wkcda_saleschannel": 2,
            "wkcda_transactionkind": 1
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "wkcda_paymenttransactionid": "b50e8400-e29b-41d4-a716-446655440000",
            "wkcda_amount": 880.0
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let req = NewPayment {
        payer_bind: "/contacts(550e8400-e29b-41d4-a716-446655440000)".into(),
        tier_history_bind: Some(
            "/wkcda_membershiptierhistories(750e8400-e29b-41d4-a716-446655440000)".into(),
        ),
        amount: 880.0,
        discount_amount: Some(120.0),
        payment_type_value: 4,
        sales_channel_value: 2,
        kind_value: 1,
        transaction_date: "2026-03-01T09:00:00Z".parse().unwrap(),
    };
    let payment = client.transactions().create_payment(&req).await.unwrap();
    assert_eq!(payment.amount, Some(880.0));
}

// ── CreateMultiple batches ───────────────────────────────────────────

#[tokio::test]
async fn create_gifts_submits_one_batch_with_annotated_targets() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/api/data/v9.2/wkcda_gifttransactions/Microsoft.Dynamics.CRM.CreateMultiple",
        ))
        .and(body_partial_json(serde_json::json!({
            "Targets": [
                {
                    "@odata.type": "Microsoft.Dynamics.CRM.wkcda_gifttransaction",
                    "wkcda_amount": 100.0
                },
                {
                    "@odata.type": "Microsoft.Dynamics.CRM.wkcda_gifttransaction",
                    "wkcda_amount": 250.0
                }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Ids": [
                "c50e8400-e29b-41d4-a716-446655440000",
                "c50e8400-e29b-41d4-a716-446655440001"
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let ids = client
        .transactions()
        .create_gifts(&[gift(100.0), gift(250.0)])
        .await
        .unwrap();

    // Ids come back in input order.
    assert_eq!(ids.len(), 2);
    assert_eq!(
        ids[0].to_string(),
        "c50e8400-e29b-41d4-a716-446655440000"
    );
    assert_eq!(
        ids[1].to_string(),
        "c50e8400-e29b-41d4-a716-446655440001"
    );
}

#[tokio::test]
async fn create_gifts_surfaces_batch_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(
            "/api/data/v9.2/wkcda_gifttransactions/Microsoft.Dynamics.CRM.CreateMultiple",
        ))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid target"))
        .mount(&mock_server)
        .await;

    let client = test_client(&mock_server);
    let result = client.transactions().create_gifts(&[gift(100.0)]).await;
    match result.unwrap_err() {
        mgw_crm_client::CrmError::ApiError { status, body, .. } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid target"));
        }
        other => panic!("expected ApiError, got: {other:?}"),
    }
}
