//! # Event Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/CreateEventTransactionWS` — batch
//!   ticketing transactions
//! - `POST /services/apexrest/WKCDA/UpdateEventAttendanceWS` — batch
//!   attendance records
//!
//! Both endpoints stage valid rows and write them through one
//! `CreateMultiple` call; result lists mirror input order.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mgw_core::Email;
use mgw_crm_client::transactions::{NewAttendance, NewEventTransaction};
use mgw_crm_client::types::bind;

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::resolver::{ContactResolver, ContactTemplate, MatchStrategy};
use crate::routes::{require_crm, ROUTE_PREFIX};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Batch request to record ticketing transactions.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEventTransactionRequest {
    pub transactions: Vec<EventTransactionInput>,
}

/// One ticketing transaction.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct EventTransactionInput {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub event_code: String,
    pub ticket_count: i32,
    /// Sales channel display label, when the ticketing system reports one.
    #[serde(default)]
    pub sales_channel: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<DateTime<Utc>>,
}

impl Validate for CreateEventTransactionRequest {
    fn validate(&self) -> Result<(), String> {
        if self.transactions.is_empty() {
            return Err("Transactions list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch response for ticketing transactions, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateEventTransactionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub transactions: Vec<EventTransactionResult>,
}

impl CreateEventTransactionResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            transactions: Vec::new(),
        }
    }
}

/// Per-transaction result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct EventTransactionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub email: String,
    pub event_code: String,
    #[serde(rename = "EventTransactionID", skip_serializing_if = "Option::is_none")]
    pub event_transaction_id: Option<Uuid>,
}

impl EventTransactionResult {
    fn failure(input: &EventTransactionInput, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            email: input.email.clone(),
            event_code: input.event_code.clone(),
            event_transaction_id: None,
        }
    }
}

/// Batch request to record event attendance.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateAttendanceRequest {
    pub attendances: Vec<AttendanceInput>,
}

/// One attendance record, keyed by master customer ID.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct AttendanceInput {
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    pub event_code: String,
    pub attended: bool,
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
}

impl Validate for UpdateAttendanceRequest {
    fn validate(&self) -> Result<(), String> {
        if self.attendances.is_empty() {
            return Err("Attendances list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch response for attendance records, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateAttendanceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub attendances: Vec<AttendanceResult>,
}

impl UpdateAttendanceResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            attendances: Vec::new(),
        }
    }
}

/// Per-attendance result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct AttendanceResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    pub event_code: String,
}

impl AttendanceResult {
    fn failure(input: &AttendanceInput, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            master_customer_id: input.master_customer_id.clone(),
            event_code: input.event_code.clone(),
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the events router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{ROUTE_PREFIX}/CreateEventTransactionWS"),
            post(create_event_transactions),
        )
        .route(
            &format!("{ROUTE_PREFIX}/UpdateEventAttendanceWS"),
            post(update_attendance),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/CreateEventTransactionWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/CreateEventTransactionWS",
    request_body = CreateEventTransactionRequest,
    responses(
        (status = 200, description = "Per-transaction results", body = CreateEventTransactionResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
pub async fn create_event_transactions(
    State(state): State<AppState>,
    body: Result<Json<CreateEventTransactionRequest>, JsonRejection>,
) -> Result<Json<CreateEventTransactionResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(CreateEventTransactionResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(CreateEventTransactionResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;
    let resolver = ContactResolver::new(crm.contacts());

    let mut results: Vec<Option<EventTransactionResult>> =
        Vec::with_capacity(req.transactions.len());
    let mut staged: Vec<NewEventTransaction> = Vec::new();
    let mut staged_sources: Vec<usize> = Vec::new();

    for (index, input) in req.transactions.iter().enumerate() {
        let email = match Email::new(&input.email) {
            Ok(email) => email,
            Err(err) => {
                results.push(Some(EventTransactionResult::failure(input, err.to_string())));
                continue;
            }
        };
        if input.event_code.trim().is_empty() {
            results.push(Some(EventTransactionResult::failure(
                input,
                "EventCode must not be empty",
            )));
            continue;
        }
        if input.ticket_count <= 0 {
            results.push(Some(EventTransactionResult::failure(
                input,
                "TicketCount must be positive",
            )));
            continue;
        }
        let sales_channel_value = match &input.sales_channel {
            Some(label) => match crm
                .metadata()
                .option_value("wkcda_eventtransaction", "wkcda_saleschannel", label)
                .await?
            {
                Some(value) => Some(value),
                None => {
                    results.push(Some(EventTransactionResult::failure(
                        input,
                        format!("Unknown SalesChannel value '{label}'"),
                    )));
                    continue;
                }
            },
            None => None,
        };

        let resolved = resolver
            .resolve_or_create(
                ContactTemplate {
                    email: email.as_str(),
                    first_name: input.first_name.as_deref(),
                    last_name: input.last_name.as_deref(),
                    phone: None,
                    customer_source_value: None,
                },
                MatchStrategy::ExactEmail,
            )
            .await?;

        staged.push(NewEventTransaction {
            attendee_bind: bind("contacts", resolved.contact.id),
            event_code: input.event_code.clone(),
            ticket_count: input.ticket_count,
            sales_channel_value,
            transaction_date: input.transaction_date.unwrap_or_else(Utc::now),
        });
        staged_sources.push(index);
        results.push(None);
    }

    if !staged.is_empty() {
        match crm.transactions().create_event_transactions(&staged).await {
            Ok(ids) => {
                for (index, id) in staged_sources.iter().zip(ids) {
                    let input = &req.transactions[*index];
                    results[*index] = Some(EventTransactionResult {
                        success: true,
                        remarks: None,
                        email: input.email.clone(),
                        event_code: input.event_code.clone(),
                        event_transaction_id: Some(id),
                    });
                }
            }
            Err(err) if err.is_authorization_failure() => return Err(err.into()),
            Err(err) => {
                tracing::error!(error = %err, staged = staged.len(), "event batch failed");
                for index in &staged_sources {
                    results[*index] = Some(EventTransactionResult::failure(
                        &req.transactions[*index],
                        "CRM write failed",
                    ));
                }
            }
        }
    }

    let transactions: Vec<EventTransactionResult> = results
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                EventTransactionResult::failure(&req.transactions[index], "CRM write failed")
            })
        })
        .collect();

    let success = transactions.iter().all(|r| r.success);
    Ok(Json(CreateEventTransactionResponse {
        success,
        remarks: None,
        transactions,
    }))
}

/// POST /services/apexrest/WKCDA/UpdateEventAttendanceWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/UpdateEventAttendanceWS",
    request_body = UpdateAttendanceRequest,
    responses(
        (status = 200, description = "Per-attendance results", body = UpdateAttendanceResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
pub async fn update_attendance(
    State(state): State<AppState>,
    body: Result<Json<UpdateAttendanceRequest>, JsonRejection>,
) -> Result<Json<UpdateAttendanceResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(UpdateAttendanceResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(UpdateAttendanceResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let mut results: Vec<Option<AttendanceResult>> = Vec::with_capacity(req.attendances.len());
    let mut staged: Vec<NewAttendance> = Vec::new();
    let mut staged_sources: Vec<usize> = Vec::new();

    for (index, input) in req.attendances.iter().enumerate() {
        if input.event_code.trim().is_empty() {
            results.push(Some(AttendanceResult::failure(
                input,
                "EventCode must not be empty",
            )));
            continue;
        }
        let contact = match crm
            .contacts()
            .find_by_master_customer_id(&input.master_customer_id)
            .await?
        {
            Some(contact) => contact,
            None => {
                results.push(Some(AttendanceResult::failure(
                    input,
                    format!(
                        "No customer found for MasterCustomerID '{}'",
                        input.master_customer_id
                    ),
                )));
                continue;
            }
        };

        staged.push(NewAttendance {
            attendee_bind: bind("contacts", contact.id),
            event_code: input.event_code.clone(),
            attended: input.attended,
            check_in_time: input.check_in_time,
        });
        staged_sources.push(index);
        results.push(None);
    }

    if !staged.is_empty() {
        match crm.transactions().create_attendances(&staged).await {
            Ok(_) => {
                for index in &staged_sources {
                    let input = &req.attendances[*index];
                    results[*index] = Some(AttendanceResult {
                        success: true,
                        remarks: None,
                        master_customer_id: input.master_customer_id.clone(),
                        event_code: input.event_code.clone(),
                    });
                }
            }
            Err(err) if err.is_authorization_failure() => return Err(err.into()),
            Err(err) => {
                tracing::error!(error = %err, staged = staged.len(), "attendance batch failed");
                for index in &staged_sources {
                    results[*index] = Some(AttendanceResult::failure(
                        &req.attendances[*index],
                        "CRM write failed",
                    ));
                }
            }
        }
    }

    let attendances: Vec<AttendanceResult> = results
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                AttendanceResult::failure(&req.attendances[index], "CRM write failed")
            })
        })
        .collect();

    let success = attendances.iter().all(|r| r.success);
    Ok(Json(UpdateAttendanceResponse {
        success,
        remarks: None,
        attendances,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_request_requires_transactions() {
        let req = CreateEventTransactionRequest {
            transactions: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn attendance_request_requires_items() {
        let req = UpdateAttendanceRequest {
            attendances: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn event_input_roundtrips_through_json() {
        let json = serde_json::json!({
            "Email": "guest@example.com",
            "EventCode": "EXH-2026-07",
            "TicketCount": 2,
            "SalesChannel": "Online",
            "TransactionDate": "2026-03-01T10:00:00Z"
        });
        let input: EventTransactionInput = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(input.ticket_count, 2);
        let back = serde_json::to_value(&input).unwrap();
        assert_eq!(back["EventCode"], json["EventCode"]);
        assert_eq!(back["TicketCount"], json["TicketCount"]);
    }
}
