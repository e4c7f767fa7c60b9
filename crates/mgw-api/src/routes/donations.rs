//! # Donation Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/CreateOnlineDonationTransactionWS` —
//!   batch gift transactions
//!
//! Valid rows are accumulated and written through a single
//! `CreateMultiple` call; rows that fail validation are reported
//! individually without being submitted. The result list mirrors input
//! order — results are assembled by input index, never keyed by business
//! fields.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mgw_core::Email;
use mgw_crm_client::transactions::NewGift;
use mgw_crm_client::types::bind;

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::resolver::{ContactResolver, ContactTemplate, MatchStrategy};
use crate::routes::{require_crm, ROUTE_PREFIX};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Batch request to record online donations.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDonationRequest {
    pub donations: Vec<DonationInput>,
}

/// One donation row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct DonationInput {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub amount: f64,
    /// Gift type display label, resolved against CRM metadata.
    pub gift_type: String,
    #[serde(default)]
    pub campaign_code: Option<String>,
    #[serde(default)]
    pub receipt_required: Option<bool>,
    #[serde(default)]
    pub donation_date: Option<NaiveDate>,
}

impl Validate for CreateDonationRequest {
    fn validate(&self) -> Result<(), String> {
        if self.donations.is_empty() {
            return Err("Donations list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch response, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateDonationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub donations: Vec<DonationResult>,
}

impl CreateDonationResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            donations: Vec::new(),
        }
    }
}

/// Per-donation result.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct DonationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub email: String,
    #[serde(rename = "MasterCustomerID", skip_serializing_if = "Option::is_none")]
    pub master_customer_id: Option<String>,
    #[serde(rename = "GiftTransactionID", skip_serializing_if = "Option::is_none")]
    pub gift_transaction_id: Option<Uuid>,
}

impl DonationResult {
    fn failure(email: &str, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            email: email.to_string(),
            master_customer_id: None,
            gift_transaction_id: None,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the donations router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        &format!("{ROUTE_PREFIX}/CreateOnlineDonationTransactionWS"),
        post(create_donations),
    )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/CreateOnlineDonationTransactionWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/CreateOnlineDonationTransactionWS",
    request_body = CreateDonationRequest,
    responses(
        (status = 200, description = "Per-donation results", body = CreateDonationResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
pub async fn create_donations(
    State(state): State<AppState>,
    body: Result<Json<CreateDonationRequest>, JsonRejection>,
) -> Result<Json<CreateDonationResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(CreateDonationResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(CreateDonationResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;
    let resolver = ContactResolver::new(crm.contacts());

    // Pass 1: validate each row and stage the valid ones for the batch,
    // remembering which input index each staged gift belongs to.
    let mut results: Vec<Option<DonationResult>> = Vec::with_capacity(req.donations.len());
    let mut staged: Vec<NewGift> = Vec::new();
    let mut staged_sources: Vec<usize> = Vec::new();
    let mut staged_customers: Vec<Option<String>> = Vec::new();

    for (index, input) in req.donations.iter().enumerate() {
        let email = match Email::new(&input.email) {
            Ok(email) => email,
            Err(err) => {
                results.push(Some(DonationResult::failure(&input.email, err.to_string())));
                continue;
            }
        };
        if input.amount <= 0.0 {
            results.push(Some(DonationResult::failure(
                &input.email,
                "Donation amount must be positive",
            )));
            continue;
        }
        let gift_type_value = match crm
            .metadata()
            .option_value("wkcda_gifttransaction", "wkcda_gifttype", &input.gift_type)
            .await?
        {
            Some(value) => value,
            None => {
                results.push(Some(DonationResult::failure(
                    &input.email,
                    format!("Unknown GiftType value '{}'", input.gift_type),
                )));
                continue;
            }
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

        staged.push(NewGift {
            donor_bind: bind("contacts", resolved.contact.id),
            amount: input.amount,
            gift_type_value,
            campaign_code: input.campaign_code.clone(),
            receipt_required: input.receipt_required,
            transaction_date: input.donation_date.unwrap_or_else(|| Utc::now().date_naive()),
        });
        staged_sources.push(index);
        staged_customers.push(resolved.contact.master_customer_id.clone());
        results.push(None); // filled in after the batch write
    }

    // Pass 2: one batch write for everything that validated.
    if !staged.is_empty() {
        match crm.transactions().create_gifts(&staged).await {
            Ok(ids) => {
                for (slot, (index, id)) in staged_sources.iter().zip(ids).enumerate() {
                    results[*index] = Some(DonationResult {
                        success: true,
                        remarks: None,
                        email: req.donations[*index].email.clone(),
                        master_customer_id: staged_customers[slot].clone(),
                        gift_transaction_id: Some(id),
                    });
                }
            }
            Err(err) if err.is_authorization_failure() => return Err(err.into()),
            Err(err) => {
                tracing::error!(error = %err, staged = staged.len(), "gift batch failed");
                for index in &staged_sources {
                    results[*index] = Some(DonationResult::failure(
                        &req.donations[*index].email,
                        "CRM write failed",
                    ));
                }
            }
        }
    }

    let donations: Vec<DonationResult> = results
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                // A staged row whose id never arrived (short Ids list).
                DonationResult::failure(&req.donations[index].email, "CRM write failed")
            })
        })
        .collect();

    let success = donations.iter().all(|r| r.success);
    Ok(Json(CreateDonationResponse {
        success,
        remarks: None,
        donations,
    }))
}
