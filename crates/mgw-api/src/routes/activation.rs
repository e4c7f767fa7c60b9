//! # Activation Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/ActivationCodeValidation` — check a
//!   code without redeeming it
//! - `POST /services/apexrest/WKCDA/MembershipActivationWS` — redeem a
//!   code and start the membership
//!
//! Codes are addressed by `CodeType`: an `ActivationCode` issued with a
//! gifted/prepaid membership, or the `PhysicalCardSerialNumber` printed on
//! a membership card. A `New` code older than 90 days reads as expired;
//! the expiry is computed here, never written back to the CRM.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mgw_core::{
    try_activate, ActivationCode, ActivationStatus, CardSerial, Email, Phone,
};
use mgw_crm_client::memberships::{Activation, ActivationUpdate, NewTierHistory};
use mgw_crm_client::types::bind;
use mgw_crm_client::CrmClient;

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::resolver::{ContactResolver, ContactTemplate, MatchStrategy};
use crate::routes::{require_crm, system_option, ROUTE_PREFIX};
use crate::state::AppState;

/// Default membership length when a tier does not define one.
const DEFAULT_VALIDITY_MONTHS: u32 = 12;

// ── Code addressing ─────────────────────────────────────────────────

/// How the caller addresses an activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeKind {
    ActivationCode,
    PhysicalCardSerialNumber,
}

impl CodeKind {
    fn parse(label: &str) -> Option<Self> {
        match label {
            "ActivationCode" => Some(Self::ActivationCode),
            "PhysicalCardSerialNumber" => Some(Self::PhysicalCardSerialNumber),
            _ => None,
        }
    }
}

/// Validate the code value's shape and look up its activation record.
async fn find_activation(
    crm: &CrmClient,
    kind: CodeKind,
    value: &str,
) -> Result<Result<Option<Activation>, String>, AppError> {
    match kind {
        CodeKind::ActivationCode => match ActivationCode::new(value) {
            Ok(code) => Ok(Ok(crm
                .memberships()
                .find_activation_by_code(code.as_str())
                .await?)),
            Err(err) => Ok(Err(err.to_string())),
        },
        CodeKind::PhysicalCardSerialNumber => match CardSerial::new(value) {
            Ok(serial) => Ok(Ok(crm
                .memberships()
                .find_activation_by_card_serial(serial.as_str())
                .await?)),
            Err(err) => Ok(Err(err.to_string())),
        },
    }
}

/// Map the record's persisted status value back to [`ActivationStatus`].
///
/// The CRM stores statuses as option-set integers; the gateway compares
/// against the metadata-resolved values for `New` and `Activated`.
async fn persisted_status(
    crm: &CrmClient,
    activation: &Activation,
) -> Result<ActivationStatus, AppError> {
    let new_value =
        system_option(crm, "wkcda_membershipactivation", "wkcda_status", "New").await?;
    let activated_value =
        system_option(crm, "wkcda_membershipactivation", "wkcda_status", "Activated").await?;

    match activation.status_value {
        Some(v) if v == new_value => Ok(ActivationStatus::New),
        Some(v) if v == activated_value => Ok(ActivationStatus::Activated),
        other => Err(AppError::Upstream(format!(
            "activation {} has unrecognized status value {other:?}",
            activation.id
        ))),
    }
}

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to validate an activation code or card serial.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ActivationCodeValidationRequest {
    /// `"ActivationCode"` or `"PhysicalCardSerialNumber"`.
    pub code_type: String,
    pub code_value: String,
}

impl Validate for ActivationCodeValidationRequest {
    fn validate(&self) -> Result<(), String> {
        if CodeKind::parse(&self.code_type).is_none() {
            return Err(format!(
                "CodeType must be 'ActivationCode' or 'PhysicalCardSerialNumber', got '{}'",
                self.code_type
            ));
        }
        if self.code_value.trim().is_empty() {
            return Err("CodeValue must not be empty".to_string());
        }
        Ok(())
    }
}

/// Validation outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ActivationCodeValidationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Name of the tier the code grants, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_name: Option<String>,
    /// Effective status label (`New`, `Activated`, `Expired`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ActivationCodeValidationResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            tier_name: None,
            status: None,
        }
    }
}

/// Request to redeem a code and start the membership.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MembershipActivationRequest {
    /// `"ActivationCode"` or `"PhysicalCardSerialNumber"`.
    pub code_type: String,
    pub code_value: String,
    pub customer: ActivationCustomer,
}

/// The redeeming customer.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ActivationCustomer {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Validate for MembershipActivationRequest {
    fn validate(&self) -> Result<(), String> {
        if CodeKind::parse(&self.code_type).is_none() {
            return Err(format!(
                "CodeType must be 'ActivationCode' or 'PhysicalCardSerialNumber', got '{}'",
                self.code_type
            ));
        }
        if self.code_value.trim().is_empty() {
            return Err("CodeValue must not be empty".to_string());
        }
        if self.customer.email.trim().is_empty() {
            return Err("Customer email is required".to_string());
        }
        Ok(())
    }
}

/// Redemption outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MembershipActivationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "MasterCustomerID", skip_serializing_if = "Option::is_none")]
    pub master_customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_end_date: Option<NaiveDate>,
}

impl MembershipActivationResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            master_customer_id: None,
            membership_start_date: None,
            membership_end_date: None,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the activation router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{ROUTE_PREFIX}/ActivationCodeValidation"),
            post(validate_code),
        )
        .route(
            &format!("{ROUTE_PREFIX}/MembershipActivationWS"),
            post(activate_membership),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/ActivationCodeValidation
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/ActivationCodeValidation",
    request_body = ActivationCodeValidationRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ActivationCodeValidationResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "activation"
)]
pub async fn validate_code(
    State(state): State<AppState>,
    body: Result<Json<ActivationCodeValidationRequest>, JsonRejection>,
) -> Result<Json<ActivationCodeValidationResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(ActivationCodeValidationResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(ActivationCodeValidationResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let Some(kind) = CodeKind::parse(&req.code_type) else {
        return Ok(Json(ActivationCodeValidationResponse::rejected(format!(
            "Unknown CodeType '{}'",
            req.code_type
        ))));
    };
    let activation = match find_activation(crm, kind, &req.code_value).await? {
        Ok(Some(activation)) => activation,
        Ok(None) => {
            return Ok(Json(ActivationCodeValidationResponse::rejected(
                "No activation record found for this code",
            )))
        }
        Err(remark) => return Ok(Json(ActivationCodeValidationResponse::rejected(remark))),
    };

    let issued_at = activation.issued_at.ok_or_else(|| {
        AppError::Upstream(format!("activation {} has no issue date", activation.id))
    })?;
    let status = persisted_status(crm, &activation)
        .await?
        .effective(issued_at, Utc::now());

    match status {
        ActivationStatus::Activated => Ok(Json(ActivationCodeValidationResponse {
            success: false,
            remarks: Some("This code has already been activated".to_string()),
            tier_name: None,
            status: Some(status.as_label().to_string()),
        })),
        ActivationStatus::Expired => Ok(Json(ActivationCodeValidationResponse {
            success: false,
            remarks: Some("This code has expired".to_string()),
            tier_name: None,
            status: Some(status.as_label().to_string()),
        })),
        ActivationStatus::New => {
            let tier_name = match activation.tier_id {
                Some(tier_id) => crm
                    .memberships()
                    .find_tier_by_id(tier_id)
                    .await?
                    .and_then(|t| t.name),
                None => None,
            };
            Ok(Json(ActivationCodeValidationResponse {
                success: true,
                remarks: None,
                tier_name,
                status: Some(status.as_label().to_string()),
            }))
        }
    }
}

/// POST /services/apexrest/WKCDA/MembershipActivationWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/MembershipActivationWS",
    request_body = MembershipActivationRequest,
    responses(
        (status = 200, description = "Redemption outcome", body = MembershipActivationResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "activation"
)]
pub async fn activate_membership(
    State(state): State<AppState>,
    body: Result<Json<MembershipActivationRequest>, JsonRejection>,
) -> Result<Json<MembershipActivationResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(MembershipActivationResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(MembershipActivationResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let email = match Email::new(&req.customer.email) {
        Ok(email) => email,
        Err(err) => return Ok(Json(MembershipActivationResponse::rejected(err.to_string()))),
    };
    let phone = match &req.customer.phone {
        Some(raw) => match Phone::new(raw) {
            Ok(phone) => Some(phone),
            Err(err) => {
                return Ok(Json(MembershipActivationResponse::rejected(err.to_string())))
            }
        },
        None => None,
    };

    let Some(kind) = CodeKind::parse(&req.code_type) else {
        return Ok(Json(MembershipActivationResponse::rejected(format!(
            "Unknown CodeType '{}'",
            req.code_type
        ))));
    };
    let activation = match find_activation(crm, kind, &req.code_value).await? {
        Ok(Some(activation)) => activation,
        Ok(None) => {
            return Ok(Json(MembershipActivationResponse::rejected(
                "No activation record found for this code",
            )))
        }
        Err(remark) => return Ok(Json(MembershipActivationResponse::rejected(remark))),
    };

    let issued_at = activation.issued_at.ok_or_else(|| {
        AppError::Upstream(format!("activation {} has no issue date", activation.id))
    })?;
    let now = Utc::now();
    let status = persisted_status(crm, &activation).await?;
    if let Err(err) = try_activate(status, issued_at, now) {
        return Ok(Json(MembershipActivationResponse::rejected(err.to_string())));
    }

    // Resolve or create the redeeming contact.
    let resolver = ContactResolver::new(crm.contacts());
    let resolved = resolver
        .resolve_or_create(
            ContactTemplate {
                email: email.as_str(),
                first_name: req.customer.first_name.as_deref(),
                last_name: req.customer.last_name.as_deref(),
                phone: phone.as_ref().map(|p| p.as_str()),
                customer_source_value: None,
            },
            MatchStrategy::EmailThenPhone,
        )
        .await?;

    // Membership window: activation date through the tier's validity.
    let tier = match activation.tier_id {
        Some(tier_id) => crm.memberships().find_tier_by_id(tier_id).await?,
        None => None,
    };
    let tier = match tier {
        Some(tier) => tier,
        None => {
            return Err(AppError::Upstream(format!(
                "activation {} is not linked to a membership tier",
                activation.id
            )))
        }
    };
    let validity = tier
        .validity_months
        .and_then(|m| u32::try_from(m).ok())
        .unwrap_or(DEFAULT_VALIDITY_MONTHS);
    let start_date = now.date_naive();
    let end_date = start_date
        .checked_add_months(Months::new(validity))
        .ok_or_else(|| AppError::Internal("membership end date overflow".to_string()))?;

    crm.memberships()
        .create_tier_history(&NewTierHistory {
            member_bind: bind("contacts", resolved.contact.id),
            tier_bind: bind("wkcda_membershiptiers", tier.id),
            start_date,
            end_date,
        })
        .await?;

    let activated_value =
        system_option(crm, "wkcda_membershipactivation", "wkcda_status", "Activated").await?;
    crm.memberships()
        .mark_activated(
            activation.id,
            &ActivationUpdate {
                status_value: activated_value,
                redeemed_by_bind: bind("contacts", resolved.contact.id),
                activated_at: now,
            },
        )
        .await?;

    tracing::info!(
        activation_id = %activation.id,
        created_contact = resolved.created,
        "membership activated"
    );

    Ok(Json(MembershipActivationResponse {
        success: true,
        remarks: None,
        master_customer_id: resolved.contact.master_customer_id.clone(),
        membership_start_date: Some(start_date),
        membership_end_date: Some(end_date),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validation_request(code_type: &str, value: &str) -> ActivationCodeValidationRequest {
        ActivationCodeValidationRequest {
            code_type: code_type.to_string(),
            code_value: value.to_string(),
        }
    }

    #[test]
    fn code_type_domain_is_enforced() {
        assert!(validation_request("ActivationCode", "GIFT2026ABCD")
            .validate()
            .is_ok());
        assert!(
            validation_request("PhysicalCardSerialNumber", "WK00123456")
                .validate()
                .is_ok()
        );
        let err = validation_request("GiftCode", "GIFT2026ABCD")
            .validate()
            .unwrap_err();
        assert!(err.contains("CodeType"));
    }

    #[test]
    fn empty_code_value_rejected() {
        assert!(validation_request("ActivationCode", "  ")
            .validate()
            .is_err());
    }

    #[test]
    fn activation_request_requires_email() {
        let req = MembershipActivationRequest {
            code_type: "ActivationCode".into(),
            code_value: "GIFT2026ABCD".into(),
            customer: ActivationCustomer {
                email: "".into(),
                first_name: None,
                last_name: None,
                phone: None,
            },
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn validation_request_roundtrips_through_json() {
        let json = serde_json::json!({
            "CodeType": "ActivationCode",
            "CodeValue": "GIFT2026ABCD"
        });
        let req: ActivationCodeValidationRequest = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(req.code_type, "ActivationCode");
        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back, json);
    }
}
