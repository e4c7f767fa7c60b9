//! # Consent Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/UpdateCustomerSubscriptionWS` —
//!   e-marketing subscription flags
//! - `POST /services/apexrest/WKCDA/UpdateCustomerPICSWS` — PICS
//!   (Personal Information Collection Statement) consent flags
//!
//! Both endpoints require the portal's `Login` flag: consent changes are
//! only accepted for authenticated portal sessions.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mgw_crm_client::contacts::ContactUpdate;

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::routes::{require_crm, ROUTE_PREFIX};
use crate::state::AppState;

/// Remark returned when the portal session flag is absent.
const NOT_LOGGED_IN_REMARK: &str = "Customer is not logged in";

// ── Request/Response DTOs ───────────────────────────────────────────

/// Batch request to update subscription flags.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateSubscriptionRequest {
    /// Portal session flag; `false` rejects the whole request.
    pub login: bool,
    pub subscriptions: Vec<SubscriptionInput>,
}

/// One subscription change.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct SubscriptionInput {
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    #[serde(rename = "EMarketingConsent")]
    pub e_marketing_consent: bool,
    #[serde(default)]
    pub consent_date: Option<NaiveDate>,
}

impl Validate for UpdateSubscriptionRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.login {
            return Err(NOT_LOGGED_IN_REMARK.to_string());
        }
        if self.subscriptions.is_empty() {
            return Err("Subscriptions list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch request to update PICS consent flags.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdatePicsRequest {
    /// Portal session flag; `false` rejects the whole request.
    pub login: bool,
    pub consents: Vec<PicsInput>,
}

/// One PICS consent change.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PicsInput {
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    #[serde(rename = "PICSConsent")]
    pub pics_consent: bool,
    #[serde(default)]
    pub consent_date: Option<NaiveDate>,
}

impl Validate for UpdatePicsRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.login {
            return Err(NOT_LOGGED_IN_REMARK.to_string());
        }
        if self.consents.is_empty() {
            return Err("Consents list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch response shared by both consent endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub results: Vec<ConsentResult>,
}

impl ConsentResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            results: Vec::new(),
        }
    }
}

/// Per-item consent result, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ConsentResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
}

impl ConsentResult {
    fn failure(master_customer_id: &str, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            master_customer_id: master_customer_id.to_string(),
        }
    }

    fn ok(master_customer_id: &str) -> Self {
        Self {
            success: true,
            remarks: None,
            master_customer_id: master_customer_id.to_string(),
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the consents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{ROUTE_PREFIX}/UpdateCustomerSubscriptionWS"),
            post(update_subscription),
        )
        .route(
            &format!("{ROUTE_PREFIX}/UpdateCustomerPICSWS"),
            post(update_pics),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/UpdateCustomerSubscriptionWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/UpdateCustomerSubscriptionWS",
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Per-item results", body = ConsentResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "consents"
)]
pub async fn update_subscription(
    State(state): State<AppState>,
    body: Result<Json<UpdateSubscriptionRequest>, JsonRejection>,
) -> Result<Json<ConsentResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(ConsentResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(ConsentResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let mut results = Vec::with_capacity(req.subscriptions.len());
    for input in &req.subscriptions {
        let update = ContactUpdate {
            e_marketing_consent: Some(input.e_marketing_consent),
            consent_date: Some(input.consent_date.unwrap_or_else(|| Utc::now().date_naive())),
            ..Default::default()
        };
        results.push(apply_consent_update(crm, &input.master_customer_id, update).await?);
    }

    let success = results.iter().all(|r| r.success);
    Ok(Json(ConsentResponse {
        success,
        remarks: None,
        results,
    }))
}

/// POST /services/apexrest/WKCDA/UpdateCustomerPICSWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/UpdateCustomerPICSWS",
    request_body = UpdatePicsRequest,
    responses(
        (status = 200, description = "Per-item results", body = ConsentResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "consents"
)]
pub async fn update_pics(
    State(state): State<AppState>,
    body: Result<Json<UpdatePicsRequest>, JsonRejection>,
) -> Result<Json<ConsentResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(ConsentResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(ConsentResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let mut results = Vec::with_capacity(req.consents.len());
    for input in &req.consents {
        let update = ContactUpdate {
            pics_consent: Some(input.pics_consent),
            consent_date: Some(input.consent_date.unwrap_or_else(|| Utc::now().date_naive())),
            ..Default::default()
        };
        results.push(apply_consent_update(crm, &input.master_customer_id, update).await?);
    }

    let success = results.iter().all(|r| r.success);
    Ok(Json(ConsentResponse {
        success,
        remarks: None,
        results,
    }))
}

/// Look up the contact and apply one consent patch.
async fn apply_consent_update(
    crm: &mgw_crm_client::CrmClient,
    master_customer_id: &str,
    update: ContactUpdate,
) -> Result<ConsentResult, AppError> {
    let contact = match crm
        .contacts()
        .find_by_master_customer_id(master_customer_id)
        .await?
    {
        Some(contact) => contact,
        None => {
            return Ok(ConsentResult::failure(
                master_customer_id,
                format!("No customer found for MasterCustomerID '{master_customer_id}'"),
            ))
        }
    };

    match crm.contacts().update(contact.id, &update).await {
        Ok(_) => Ok(ConsentResult::ok(master_customer_id)),
        Err(err) if err.is_authorization_failure() => Err(err.into()),
        Err(err) => {
            tracing::error!(
                master_customer_id = %master_customer_id,
                error = %err,
                "consent update failed"
            );
            Ok(ConsentResult::failure(master_customer_id, "CRM write failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_request_rejects_logged_out() {
        let req = UpdateSubscriptionRequest {
            login: false,
            subscriptions: vec![SubscriptionInput {
                master_customer_id: "P17234567890123".into(),
                e_marketing_consent: true,
                consent_date: None,
            }],
        };
        assert_eq!(req.validate().unwrap_err(), NOT_LOGGED_IN_REMARK);
    }

    #[test]
    fn pics_request_rejects_logged_out() {
        let req = UpdatePicsRequest {
            login: false,
            consents: vec![],
        };
        assert_eq!(req.validate().unwrap_err(), NOT_LOGGED_IN_REMARK);
    }

    #[test]
    fn subscription_request_requires_items() {
        let req = UpdateSubscriptionRequest {
            login: true,
            subscriptions: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn subscription_input_roundtrips_through_json() {
        let json = serde_json::json!({
            "MasterCustomerID": "P17234567890123",
            "EMarketingConsent": true,
            "ConsentDate": "2026-03-01"
        });
        let input: SubscriptionInput = serde_json::from_value(json.clone()).unwrap();
        assert!(input.e_marketing_consent);
        let back = serde_json::to_value(&input).unwrap();
        assert_eq!(back["MasterCustomerID"], json["MasterCustomerID"]);
        assert_eq!(back["ConsentDate"], json["ConsentDate"]);
    }
}
