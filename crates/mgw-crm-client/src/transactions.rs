//! Typed client for the append-only transaction tables.
//!
//! Payments are written one at a time (each is linked to a tier history
//! created in the same request). Gifts, event transactions, and attendance
//! records arrive in caller batches and go through the `CreateMultiple`
//! action:
//!
//! `POST {entity-set}/Microsoft.Dynamics.CRM.CreateMultiple` with
//! `{ "Targets": [ … ] }` → `{ "Ids": [ … ] }`, ids in input order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrmError;
use crate::types::CreateMultipleResponse;
use crate::API_PREFIX;

// -- Record types -------------------------------------------------------------

/// A payment transaction as returned by the Web API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    #[serde(rename = "wkcda_paymenttransactionid")]
    pub id: Uuid,
    #[serde(rename = "wkcda_amount", default)]
    pub amount: Option<f64>,
    #[serde(rename = "wkcda_discountamount", default)]
    pub discount_amount: Option<f64>,
    #[serde(rename = "wkcda_transactiondate", default)]
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Request body for a payment transaction (purchase or refund kind).
#[derive(Debug, Clone, Serialize)]
pub struct NewPayment {
    #[serde(rename = "wkcda_Payer@odata.bind")]
    pub payer_bind: String,
    #[serde(rename = "wkcda_TierHistory@odata.bind", skip_serializing_if = "Option::is_none")]
    pub tier_history_bind: Option<String>,
    #[serde(rename = "wkcda_amount")]
    pub amount: f64,
    #[serde(rename = "wkcda_discountamount", skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<f64>,
    /// Payment type option-set value (resolved from the caller's label).
    #[serde(rename = "wkcda_paymenttype")]
    pub payment_type_value: i32,
    /// Sales channel option-set value.
    #[serde(rename = "wkcda_saleschannel")]
    pub sales_channel_value: i32,
    /// Transaction kind option-set value (`Purchase` or `Refund`).
    #[serde(rename = "wkcda_transactionkind")]
    pub kind_value: i32,
    #[serde(rename = "wkcda_transactiondate")]
    pub transaction_date: DateTime<Utc>,
}

/// Request body for one gift (donation) transaction.
#[derive(Debug, Clone, Serialize)]
pub struct NewGift {
    #[serde(rename = "wkcda_Donor@odata.bind")]
    pub donor_bind: String,
    #[serde(rename = "wkcda_amount")]
    pub amount: f64,
    /// Gift type option-set value.
    #[serde(rename = "wkcda_gifttype")]
    pub gift_type_value: i32,
    #[serde(rename = "wkcda_campaigncode", skip_serializing_if = "Option::is_none")]
    pub campaign_code: Option<String>,
    #[serde(rename = "wkcda_receiptrequired", skip_serializing_if = "Option::is_none")]
    pub receipt_required: Option<bool>,
    #[serde(rename = "wkcda_transactiondate")]
    pub transaction_date: NaiveDate,
}

/// Request body for one event/ticketing transaction.
#[derive(Debug, Clone, Serialize)]
pub struct NewEventTransaction {
    #[serde(rename = "wkcda_Attendee@odata.bind")]
    pub attendee_bind: String,
    #[serde(rename = "wkcda_eventcode")]
    pub event_code: String,
    #[serde(rename = "wkcda_ticketcount")]
    pub ticket_count: i32,
    /// Sales channel option-set value, when the caller supplied a channel.
    #[serde(rename = "wkcda_saleschannel", skip_serializing_if = "Option::is_none")]
    pub sales_channel_value: Option<i32>,
    #[serde(rename = "wkcda_transactiondate")]
    pub transaction_date: DateTime<Utc>,
}

/// Request body for one attendance record.
#[derive(Debug, Clone, Serialize)]
pub struct NewAttendance {
    #[serde(rename = "wkcda_Attendee@odata.bind")]
    pub attendee_bind: String,
    #[serde(rename = "wkcda_eventcode")]
    pub event_code: String,
    #[serde(rename = "wkcda_attended")]
    pub attended: bool,
    #[serde(rename = "wkcda_checkintime", skip_serializing_if = "Option::is_none")]
    pub check_in_time: Option<DateTime<Utc>>,
}

// -- Client -------------------------------------------------------------------

/// Client for the transaction tables.
#[derive(Debug, Clone)]
pub struct TransactionClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl TransactionClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Create a single payment transaction.
    pub async fn create_payment(&self, req: &NewPayment) -> Result<PaymentTransaction, CrmError> {
        let endpoint = "POST /wkcda_paymenttransactions";
        let url = format!(
            "{}{}/wkcda_paymenttransactions",
            self.base_url, API_PREFIX
        );

        let resp = crate::retry::retry_send(|| {
            self.http
                .post(&url)
                .header("Prefer", "return=representation")
                .json(req)
                .send()
        })
        .await
        .map_err(|e| CrmError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::ApiError {
                endpoint: endpoint.into(),
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| CrmError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }

    /// Create a batch of gift transactions. Returns ids in input order.
    pub async fn create_gifts(&self, gifts: &[NewGift]) -> Result<Vec<Uuid>, CrmError> {
        self.create_multiple(
            "wkcda_gifttransactions",
            "Microsoft.Dynamics.CRM.wkcda_gifttransaction",
            gifts,
        )
        .await
    }

    /// Create a batch of event transactions. Returns ids in input order.
    pub async fn create_event_transactions(
        &self,
        transactions: &[NewEventTransaction],
    ) -> Result<Vec<Uuid>, CrmError> {
        self.create_multiple(
            "wkcda_eventtransactions",
            "Microsoft.Dynamics.CRM.wkcda_eventtransaction",
            transactions,
        )
        .await
    }

    /// Create a batch of attendance records. Returns ids in input order.
    pub async fn create_attendances(
        &self,
        attendances: &[NewAttendance],
    ) -> Result<Vec<Uuid>, CrmError> {
        self.create_multiple(
            "wkcda_attendances",
            "Microsoft.Dynamics.CRM.wkcda_attendance",
            attendances,
        )
        .await
    }

    /// Shared `CreateMultiple` plumbing.
    ///
    /// Each target object must carry `@odata.type` naming its logical type;
    /// the annotation is injected here so request structs stay plain.
    async fn create_multiple<T: Serialize>(
        &self,
        entity_set: &str,
        odata_type: &str,
        targets: &[T],
    ) -> Result<Vec<Uuid>, CrmError> {
        let endpoint = format!("POST /{entity_set}/CreateMultiple");
        let url = format!(
            "{}{}/{}/Microsoft.Dynamics.CRM.CreateMultiple",
            self.base_url, API_PREFIX, entity_set
        );

        let mut annotated = Vec::with_capacity(targets.len());
        for target in targets {
            let mut value =
                serde_json::to_value(target).map_err(|e| CrmError::Serialization {
                    endpoint: endpoint.clone(),
                    source: e,
                })?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "@odata.type".to_string(),
                    serde_json::Value::String(odata_type.to_string()),
                );
            }
            annotated.push(value);
        }
        let body = serde_json::json!({ "Targets": annotated });

        let resp = crate::retry::retry_send(|| self.http.post(&url).json(&body).send())
            .await
            .map_err(|e| CrmError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CrmError::ApiError {
                endpoint,
                status,
                body: text,
            });
        }

        let parsed: CreateMultipleResponse =
            resp.json().await.map_err(|e| CrmError::Deserialization {
                endpoint,
                source: e,
            })?;
        Ok(parsed.ids)
    }
}
