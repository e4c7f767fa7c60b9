//! # Paid Membership Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/PaidMembershipPurchaseBeforePayment` —
//!   validate the cart and create the group + member contacts
//! - `POST /services/apexrest/WKCDA/PaidMembershipPurchaseAfterPayment` —
//!   record the paid purchase: tier history + payment transaction
//! - `POST /services/apexrest/WKCDA/MembershipUpgradeWS` — end-date the
//!   current membership, refund, and start the new tier
//! - `POST /services/apexrest/WKCDA/MembershipRenewalWS` — extend the
//!   membership from its current expiry
//!
//! Group cardinality (Individual 1 / Dual 2 / Family 7, exactly one
//! primary) is enforced before any write. The count-then-insert sequence
//! is two CRM calls; concurrent requests against the same group can race.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mgw_core::{GroupError, GroupType, MemberRole, Email, Phone};
use mgw_crm_client::memberships::{NewGroup, NewGroupRelationship, NewTierHistory, TierHistory};
use mgw_crm_client::transactions::NewPayment;
use mgw_crm_client::types::bind;
use mgw_crm_client::CrmClient;

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::resolver::{ContactResolver, ContactTemplate, MatchStrategy};
use crate::routes::{require_crm, system_option, ROUTE_PREFIX};
use crate::state::AppState;

/// Remark returned when the portal session flag is absent.
const NOT_LOGGED_IN_REMARK: &str = "Customer is not logged in";

/// Default membership length when a tier does not define one.
const DEFAULT_VALIDITY_MONTHS: u32 = 12;

// ── Shared payment handling ─────────────────────────────────────────

/// Payment fields shared by purchase, upgrade, and renewal.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentInput {
    pub amount: f64,
    #[serde(default)]
    pub discount_amount: Option<f64>,
    /// Payment type display label (e.g. "Credit Card"), resolved against
    /// CRM metadata.
    pub payment_type: String,
    /// Sales channel display label (e.g. "Online").
    pub sales_channel: String,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
}

impl PaymentInput {
    fn validate(&self) -> Result<(), String> {
        if self.amount <= 0.0 {
            return Err("Payment amount must be positive".to_string());
        }
        if let Some(discount) = self.discount_amount {
            if discount < 0.0 {
                return Err("Discount amount must not be negative".to_string());
            }
        }
        Ok(())
    }
}

/// Resolved option-set values for one payment.
struct PaymentCodes {
    payment_type_value: i32,
    sales_channel_value: i32,
}

/// Resolve the caller-supplied payment labels. `Err(remark)` on the inner
/// result means the label is unknown to the CRM.
async fn resolve_payment_codes(
    crm: &CrmClient,
    payment: &PaymentInput,
) -> Result<Result<PaymentCodes, String>, AppError> {
    let payment_type_value = match crm
        .metadata()
        .option_value(
            "wkcda_paymenttransaction",
            "wkcda_paymenttype",
            &payment.payment_type,
        )
        .await?
    {
        Some(value) => value,
        None => {
            return Ok(Err(format!(
                "Unknown PaymentType value '{}'",
                payment.payment_type
            )))
        }
    };
    let sales_channel_value = match crm
        .metadata()
        .option_value(
            "wkcda_paymenttransaction",
            "wkcda_saleschannel",
            &payment.sales_channel,
        )
        .await?
    {
        Some(value) => value,
        None => {
            return Ok(Err(format!(
                "Unknown SalesChannel value '{}'",
                payment.sales_channel
            )))
        }
    };
    Ok(Ok(PaymentCodes {
        payment_type_value,
        sales_channel_value,
    }))
}

/// Membership window starting at `start` for the tier's validity.
fn membership_window(
    start: NaiveDate,
    validity_months: Option<i32>,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    let validity = validity_months
        .and_then(|m| u32::try_from(m).ok())
        .unwrap_or(DEFAULT_VALIDITY_MONTHS);
    let end = start
        .checked_add_months(Months::new(validity))
        .ok_or_else(|| AppError::Internal("membership end date overflow".to_string()))?;
    Ok((start, end))
}

/// Share of the membership period consumed as of `today`, in percent.
///
/// Clamped to 0–100; a history without both dates counts as unconsumed.
fn consumption_percentage(history: &TierHistory, today: NaiveDate) -> f64 {
    let (Some(start), Some(end)) = (history.start_date, history.end_date) else {
        return 0.0;
    };
    let total = (end - start).num_days();
    if total <= 0 {
        return 0.0;
    }
    let elapsed = (today - start).num_days();
    let pct = (elapsed as f64 / total as f64) * 100.0;
    (pct.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

// ── BeforePayment DTOs ──────────────────────────────────────────────

/// Request to validate a membership cart and create its group.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PurchaseBeforePaymentRequest {
    /// Portal session flag; `false` rejects the whole request.
    pub login: bool,
    /// Group type label: Individual, Dual, or Family.
    pub group_type: String,
    /// Tier being purchased.
    pub tier_name: String,
    #[serde(default)]
    pub group_name: Option<String>,
    pub members: Vec<MemberInput>,
}

/// One member in the cart.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MemberInput {
    /// Role label: "Primary Member" or "Add-on Member".
    pub role: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Validate for PurchaseBeforePaymentRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.login {
            return Err(NOT_LOGGED_IN_REMARK.to_string());
        }
        if self.members.is_empty() {
            return Err("Members list must not be empty".to_string());
        }
        let Some(group_type) = GroupType::from_label(&self.group_type) else {
            return Err(format!("Unknown GroupType value '{}'", self.group_type));
        };

        let mut primaries = 0usize;
        for member in &self.members {
            match MemberRole::from_label(&member.role) {
                Some(MemberRole::Primary) => primaries += 1,
                Some(MemberRole::AddOn) => {}
                None => return Err(format!("Unknown Role value '{}'", member.role)),
            }
        }
        if primaries != 1 {
            return Err(GroupError::PrimaryCountInvalid(primaries).to_string());
        }
        if self.members.len() > group_type.member_capacity() {
            return Err(GroupError::CapacityExceeded {
                group_type,
                capacity: group_type.member_capacity(),
            }
            .to_string());
        }
        Ok(())
    }
}

/// BeforePayment outcome: the created group and per-member results.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PurchaseBeforePaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "GroupID", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
    pub members: Vec<MemberResult>,
}

impl PurchaseBeforePaymentResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            group_id: None,
            members: Vec::new(),
        }
    }
}

/// Per-member result, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MemberResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub email: String,
    pub role: String,
    #[serde(rename = "MasterCustomerID", skip_serializing_if = "Option::is_none")]
    pub master_customer_id: Option<String>,
}

// ── AfterPayment DTOs ───────────────────────────────────────────────

/// Request to record a paid membership purchase.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PurchaseAfterPaymentRequest {
    pub login: bool,
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    pub tier_name: String,
    pub payment: PaymentInput,
}

impl Validate for PurchaseAfterPaymentRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.login {
            return Err(NOT_LOGGED_IN_REMARK.to_string());
        }
        self.payment.validate()
    }
}

/// AfterPayment outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PurchaseAfterPaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_end_date: Option<NaiveDate>,
    #[serde(rename = "PaymentTransactionID", skip_serializing_if = "Option::is_none")]
    pub payment_transaction_id: Option<Uuid>,
}

impl PurchaseAfterPaymentResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            membership_start_date: None,
            membership_end_date: None,
            payment_transaction_id: None,
        }
    }
}

// ── Upgrade / Renewal DTOs ──────────────────────────────────────────

/// Request to upgrade the active membership to a higher tier.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MembershipUpgradeRequest {
    pub login: bool,
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    pub new_tier_name: String,
    /// Refund for the unconsumed share of the current membership,
    /// computed by the portal's pricing engine.
    pub refund_amount: f64,
    pub payment: PaymentInput,
}

impl Validate for MembershipUpgradeRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.login {
            return Err(NOT_LOGGED_IN_REMARK.to_string());
        }
        if self.refund_amount < 0.0 {
            return Err("Refund amount must not be negative".to_string());
        }
        self.payment.validate()
    }
}

/// Upgrade outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MembershipUpgradeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_end_date: Option<NaiveDate>,
    #[serde(rename = "RefundTransactionID", skip_serializing_if = "Option::is_none")]
    pub refund_transaction_id: Option<Uuid>,
    #[serde(rename = "PaymentTransactionID", skip_serializing_if = "Option::is_none")]
    pub payment_transaction_id: Option<Uuid>,
}

impl MembershipUpgradeResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            membership_start_date: None,
            membership_end_date: None,
            refund_transaction_id: None,
            payment_transaction_id: None,
        }
    }
}

/// Request to renew a membership on the same or another tier.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MembershipRenewalRequest {
    pub login: bool,
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    pub tier_name: String,
    pub payment: PaymentInput,
}

impl Validate for MembershipRenewalRequest {
    fn validate(&self) -> Result<(), String> {
        if !self.login {
            return Err(NOT_LOGGED_IN_REMARK.to_string());
        }
        self.payment.validate()
    }
}

/// Renewal outcome.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct MembershipRenewalResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_end_date: Option<NaiveDate>,
    #[serde(rename = "PaymentTransactionID", skip_serializing_if = "Option::is_none")]
    pub payment_transaction_id: Option<Uuid>,
}

impl MembershipRenewalResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            membership_start_date: None,
            membership_end_date: None,
            payment_transaction_id: None,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the paid membership router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{ROUTE_PREFIX}/PaidMembershipPurchaseBeforePayment"),
            post(purchase_before_payment),
        )
        .route(
            &format!("{ROUTE_PREFIX}/PaidMembershipPurchaseAfterPayment"),
            post(purchase_after_payment),
        )
        .route(
            &format!("{ROUTE_PREFIX}/MembershipUpgradeWS"),
            post(upgrade_membership),
        )
        .route(
            &format!("{ROUTE_PREFIX}/MembershipRenewalWS"),
            post(renew_membership),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/PaidMembershipPurchaseBeforePayment
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/PaidMembershipPurchaseBeforePayment",
    request_body = PurchaseBeforePaymentRequest,
    responses(
        (status = 200, description = "Group creation outcome", body = PurchaseBeforePaymentResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "membership"
)]
pub async fn purchase_before_payment(
    State(state): State<AppState>,
    body: Result<Json<PurchaseBeforePaymentRequest>, JsonRejection>,
) -> Result<Json<PurchaseBeforePaymentResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(PurchaseBeforePaymentResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(PurchaseBeforePaymentResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let Some(group_type) = GroupType::from_label(&req.group_type) else {
        return Ok(Json(PurchaseBeforePaymentResponse::rejected(format!(
            "Unknown GroupType value '{}'",
            req.group_type
        ))));
    };

    if crm
        .memberships()
        .find_tier_by_name(&req.tier_name)
        .await?
        .is_none()
    {
        return Ok(Json(PurchaseBeforePaymentResponse::rejected(format!(
            "No membership tier named '{}'",
            req.tier_name
        ))));
    }

    let group_type_value =
        system_option(crm, "wkcda_membershipgroup", "wkcda_grouptype", group_type.as_label())
            .await?;

    // Group name defaults to the primary member's email.
    let primary_email = req
        .members
        .iter()
        .find(|m| MemberRole::from_label(&m.role) == Some(MemberRole::Primary))
        .map(|m| m.email.clone())
        .unwrap_or_default();
    let group_name = req
        .group_name
        .clone()
        .unwrap_or_else(|| format!("{primary_email} ({group_type})"));

    let group = crm
        .memberships()
        .create_group(&NewGroup {
            name: group_name,
            group_type_value,
        })
        .await?;

    let resolver = ContactResolver::new(crm.contacts());
    let mut results = Vec::with_capacity(req.members.len());
    for member in &req.members {
        results.push(enroll_member(crm, &resolver, group.id, member).await?);
    }

    let success = results.iter().all(|r| r.success);
    tracing::info!(group_id = %group.id, members = results.len(), "membership group created");
    Ok(Json(PurchaseBeforePaymentResponse {
        success,
        remarks: None,
        group_id: Some(group.id),
        members: results,
    }))
}

/// Resolve one member and link them into the group.
async fn enroll_member(
    crm: &CrmClient,
    resolver: &ContactResolver<'_>,
    group_id: Uuid,
    member: &MemberInput,
) -> Result<MemberResult, AppError> {
    let failure = |remark: String| MemberResult {
        success: false,
        remarks: Some(remark),
        email: member.email.clone(),
        role: member.role.clone(),
        master_customer_id: None,
    };

    let email = match Email::new(&member.email) {
        Ok(email) => email,
        Err(err) => return Ok(failure(err.to_string())),
    };
    let phone = match &member.phone {
        Some(raw) => match Phone::new(raw) {
            Ok(phone) => Some(phone),
            Err(err) => return Ok(failure(err.to_string())),
        },
        None => None,
    };
    // Role validity was checked at request level; an unknown label here is
    // a per-member failure to keep siblings unaffected.
    let Some(role) = MemberRole::from_label(&member.role) else {
        return Ok(failure(format!("Unknown Role value '{}'", member.role)));
    };
    let role_value = system_option(
        crm,
        "wkcda_membershipgrouprelationship",
        "wkcda_role",
        role.as_label(),
    )
    .await?;

    let resolved = resolver
        .resolve_or_create(
            ContactTemplate {
                email: email.as_str(),
                first_name: member.first_name.as_deref(),
                last_name: member.last_name.as_deref(),
                phone: phone.as_ref().map(|p| p.as_str()),
                customer_source_value: None,
            },
            MatchStrategy::EmailThenPhone,
        )
        .await?;

    match crm
        .memberships()
        .create_group_relationship(&NewGroupRelationship {
            group_bind: bind("wkcda_membershipgroups", group_id),
            member_bind: bind("contacts", resolved.contact.id),
            role_value,
        })
        .await
    {
        Ok(_) => Ok(MemberResult {
            success: true,
            remarks: None,
            email: member.email.clone(),
            role: member.role.clone(),
            master_customer_id: resolved.contact.master_customer_id.clone(),
        }),
        Err(err) if err.is_authorization_failure() => Err(err.into()),
        Err(err) => {
            tracing::error!(email = %member.email, error = %err, "group enrollment failed");
            Ok(failure("CRM write failed".to_string()))
        }
    }
}

/// POST /services/apexrest/WKCDA/PaidMembershipPurchaseAfterPayment
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/PaidMembershipPurchaseAfterPayment",
    request_body = PurchaseAfterPaymentRequest,
    responses(
        (status = 200, description = "Purchase recording outcome", body = PurchaseAfterPaymentResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "membership"
)]
pub async fn purchase_after_payment(
    State(state): State<AppState>,
    body: Result<Json<PurchaseAfterPaymentRequest>, JsonRejection>,
) -> Result<Json<PurchaseAfterPaymentResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(PurchaseAfterPaymentResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(PurchaseAfterPaymentResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let contact = match crm
        .contacts()
        .find_by_master_customer_id(&req.master_customer_id)
        .await?
    {
        Some(contact) => contact,
        None => {
            return Ok(Json(PurchaseAfterPaymentResponse::rejected(format!(
                "No customer found for MasterCustomerID '{}'",
                req.master_customer_id
            ))))
        }
    };
    let tier = match crm.memberships().find_tier_by_name(&req.tier_name).await? {
        Some(tier) => tier,
        None => {
            return Ok(Json(PurchaseAfterPaymentResponse::rejected(format!(
                "No membership tier named '{}'",
                req.tier_name
            ))))
        }
    };
    let codes = match resolve_payment_codes(crm, &req.payment).await? {
        Ok(codes) => codes,
        Err(remark) => return Ok(Json(PurchaseAfterPaymentResponse::rejected(remark))),
    };
    let purchase_kind =
        system_option(crm, "wkcda_paymenttransaction", "wkcda_transactionkind", "Purchase").await?;

    let paid_at = req.payment.payment_date.unwrap_or_else(Utc::now);
    let (start_date, end_date) = membership_window(paid_at.date_naive(), tier.validity_months)?;

    let history = crm
        .memberships()
        .create_tier_history(&NewTierHistory {
            member_bind: bind("contacts", contact.id),
            tier_bind: bind("wkcda_membershiptiers", tier.id),
            start_date,
            end_date,
        })
        .await?;

    let payment = crm
        .transactions()
        .create_payment(&NewPayment {
            payer_bind: bind("contacts", contact.id),
            tier_history_bind: Some(bind("wkcda_membershiptierhistories", history.id)),
            amount: req.payment.amount,
            discount_amount: req.payment.discount_amount,
            payment_type_value: codes.payment_type_value,
            sales_channel_value: codes.sales_channel_value,
            kind_value: purchase_kind,
            transaction_date: paid_at,
        })
        .await?;

    Ok(Json(PurchaseAfterPaymentResponse {
        success: true,
        remarks: None,
        membership_start_date: Some(start_date),
        membership_end_date: Some(end_date),
        payment_transaction_id: Some(payment.id),
    }))
}

/// POST /services/apexrest/WKCDA/MembershipUpgradeWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/MembershipUpgradeWS",
    request_body = MembershipUpgradeRequest,
    responses(
        (status = 200, description = "Upgrade outcome", body = MembershipUpgradeResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "membership"
)]
pub async fn upgrade_membership(
    State(state): State<AppState>,
    body: Result<Json<MembershipUpgradeRequest>, JsonRejection>,
) -> Result<Json<MembershipUpgradeResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(MembershipUpgradeResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(MembershipUpgradeResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let contact = match crm
        .contacts()
        .find_by_master_customer_id(&req.master_customer_id)
        .await?
    {
        Some(contact) => contact,
        None => {
            return Ok(Json(MembershipUpgradeResponse::rejected(format!(
                "No customer found for MasterCustomerID '{}'",
                req.master_customer_id
            ))))
        }
    };

    let today = Utc::now().date_naive();
    let current = match crm
        .memberships()
        .latest_tier_history_for_contact(contact.id)
        .await?
    {
        Some(history) if history.end_date.is_some_and(|end| end >= today) => history,
        _ => {
            return Ok(Json(MembershipUpgradeResponse::rejected(
                "No active membership found for this customer",
            )))
        }
    };

    let new_tier = match crm
        .memberships()
        .find_tier_by_name(&req.new_tier_name)
        .await?
    {
        Some(tier) => tier,
        None => {
            return Ok(Json(MembershipUpgradeResponse::rejected(format!(
                "No membership tier named '{}'",
                req.new_tier_name
            ))))
        }
    };
    if current.tier_id == Some(new_tier.id) {
        return Ok(Json(MembershipUpgradeResponse::rejected(
            "Customer already holds this tier",
        )));
    }

    let codes = match resolve_payment_codes(crm, &req.payment).await? {
        Ok(codes) => codes,
        Err(remark) => return Ok(Json(MembershipUpgradeResponse::rejected(remark))),
    };
    let purchase_kind =
        system_option(crm, "wkcda_paymenttransaction", "wkcda_transactionkind", "Purchase").await?;
    let refund_kind =
        system_option(crm, "wkcda_paymenttransaction", "wkcda_transactionkind", "Refund").await?;

    // End-date the current membership with its consumed share.
    let consumption = consumption_percentage(&current, today);
    crm.memberships()
        .end_tier_history(current.id, today, consumption)
        .await?;

    let now = Utc::now();
    let refund = if req.refund_amount > 0.0 {
        let refund = crm
            .transactions()
            .create_payment(&NewPayment {
                payer_bind: bind("contacts", contact.id),
                tier_history_bind: Some(bind("wkcda_membershiptierhistories", current.id)),
                amount: -req.refund_amount,
                discount_amount: None,
                payment_type_value: codes.payment_type_value,
                sales_channel_value: codes.sales_channel_value,
                kind_value: refund_kind,
                transaction_date: now,
            })
            .await?;
        Some(refund.id)
    } else {
        None
    };

    let (start_date, end_date) = membership_window(today, new_tier.validity_months)?;
    let history = crm
        .memberships()
        .create_tier_history(&NewTierHistory {
            member_bind: bind("contacts", contact.id),
            tier_bind: bind("wkcda_membershiptiers", new_tier.id),
            start_date,
            end_date,
        })
        .await?;

    let payment = crm
        .transactions()
        .create_payment(&NewPayment {
            payer_bind: bind("contacts", contact.id),
            tier_history_bind: Some(bind("wkcda_membershiptierhistories", history.id)),
            amount: req.payment.amount,
            discount_amount: req.payment.discount_amount,
            payment_type_value: codes.payment_type_value,
            sales_channel_value: codes.sales_channel_value,
            kind_value: purchase_kind,
            transaction_date: now,
        })
        .await?;

    tracing::info!(
        master_customer_id = %req.master_customer_id,
        consumption,
        "membership upgraded"
    );

    Ok(Json(MembershipUpgradeResponse {
        success: true,
        remarks: None,
        membership_start_date: Some(start_date),
        membership_end_date: Some(end_date),
        refund_transaction_id: refund,
        payment_transaction_id: Some(payment.id),
    }))
}

/// POST /services/apexrest/WKCDA/MembershipRenewalWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/MembershipRenewalWS",
    request_body = MembershipRenewalRequest,
    responses(
        (status = 200, description = "Renewal outcome", body = MembershipRenewalResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "membership"
)]
pub async fn renew_membership(
    State(state): State<AppState>,
    body: Result<Json<MembershipRenewalRequest>, JsonRejection>,
) -> Result<Json<MembershipRenewalResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(MembershipRenewalResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(MembershipRenewalResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let contact = match crm
        .contacts()
        .find_by_master_customer_id(&req.master_customer_id)
        .await?
    {
        Some(contact) => contact,
        None => {
            return Ok(Json(MembershipRenewalResponse::rejected(format!(
                "No customer found for MasterCustomerID '{}'",
                req.master_customer_id
            ))))
        }
    };
    let tier = match crm.memberships().find_tier_by_name(&req.tier_name).await? {
        Some(tier) => tier,
        None => {
            return Ok(Json(MembershipRenewalResponse::rejected(format!(
                "No membership tier named '{}'",
                req.tier_name
            ))))
        }
    };
    let codes = match resolve_payment_codes(crm, &req.payment).await? {
        Ok(codes) => codes,
        Err(remark) => return Ok(Json(MembershipRenewalResponse::rejected(remark))),
    };
    let purchase_kind =
        system_option(crm, "wkcda_paymenttransaction", "wkcda_transactionkind", "Purchase").await?;

    // A renewal extends from the current expiry; a lapsed membership
    // restarts today.
    let today = Utc::now().date_naive();
    let renewal_start = match crm
        .memberships()
        .latest_tier_history_for_contact(contact.id)
        .await?
    {
        Some(history) => match history.end_date {
            Some(end) if end >= today => end,
            _ => today,
        },
        None => today,
    };

    let (start_date, end_date) = membership_window(renewal_start, tier.validity_months)?;
    let history = crm
        .memberships()
        .create_tier_history(&NewTierHistory {
            member_bind: bind("contacts", contact.id),
            tier_bind: bind("wkcda_membershiptiers", tier.id),
            start_date,
            end_date,
        })
        .await?;

    let payment = crm
        .transactions()
        .create_payment(&NewPayment {
            payer_bind: bind("contacts", contact.id),
            tier_history_bind: Some(bind("wkcda_membershiptierhistories", history.id)),
            amount: req.payment.amount,
            discount_amount: req.payment.discount_amount,
            payment_type_value: codes.payment_type_value,
            sales_channel_value: codes.sales_channel_value,
            kind_value: purchase_kind,
            transaction_date: req.payment.payment_date.unwrap_or_else(Utc::now),
        })
        .await?;

    Ok(Json(MembershipRenewalResponse {
        success: true,
        remarks: None,
        membership_start_date: Some(start_date),
        membership_end_date: Some(end_date),
        payment_transaction_id: Some(payment.id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(role: &str, email: &str) -> MemberInput {
        MemberInput {
            role: role.to_string(),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            phone: None,
        }
    }

    fn before_request(group_type: &str, members: Vec<MemberInput>) -> PurchaseBeforePaymentRequest {
        PurchaseBeforePaymentRequest {
            login: true,
            group_type: group_type.to_string(),
            tier_name: "Family Annual".to_string(),
            group_name: None,
            members,
        }
    }

    #[test]
    fn before_payment_rejects_logged_out() {
        let mut req = before_request("Family", vec![member("Primary Member", "a@example.com")]);
        req.login = false;
        assert_eq!(req.validate().unwrap_err(), NOT_LOGGED_IN_REMARK);
    }

    #[test]
    fn before_payment_rejects_unknown_group_type() {
        let req = before_request("Corporate", vec![member("Primary Member", "a@example.com")]);
        assert!(req.validate().unwrap_err().contains("GroupType"));
    }

    #[test]
    fn before_payment_requires_exactly_one_primary() {
        let req = before_request(
            "Dual",
            vec![
                member("Add-on Member", "a@example.com"),
                member("Add-on Member", "b@example.com"),
            ],
        );
        assert!(req.validate().unwrap_err().contains("primary"));

        let req = before_request(
            "Dual",
            vec![
                member("Primary Member", "a@example.com"),
                member("Primary Member", "b@example.com"),
            ],
        );
        assert!(req.validate().unwrap_err().contains("primary"));
    }

    #[test]
    fn before_payment_enforces_family_capacity() {
        let mut members = vec![member("Primary Member", "p@example.com")];
        for i in 0..7 {
            members.push(member("Add-on Member", &format!("m{i}@example.com")));
        }
        let req = before_request("Family", members);
        let err = req.validate().unwrap_err();
        assert!(err.contains("at most 7"), "got: {err}");
    }

    #[test]
    fn before_payment_allows_full_family() {
        let mut members = vec![member("Primary Member", "p@example.com")];
        for i in 0..6 {
            members.push(member("Add-on Member", &format!("m{i}@example.com")));
        }
        assert!(before_request("Family", members).validate().is_ok());
    }

    #[test]
    fn payment_input_rejects_non_positive_amount() {
        let payment = PaymentInput {
            amount: 0.0,
            discount_amount: None,
            payment_type: "Credit Card".into(),
            sales_channel: "Online".into(),
            payment_date: None,
        };
        assert!(payment.validate().is_err());
    }

    #[test]
    fn upgrade_request_rejects_negative_refund() {
        let req = MembershipUpgradeRequest {
            login: true,
            master_customer_id: "P17234567890123".into(),
            new_tier_name: "Family Annual".into(),
            refund_amount: -10.0,
            payment: PaymentInput {
                amount: 100.0,
                discount_amount: None,
                payment_type: "Credit Card".into(),
                sales_channel: "Online".into(),
                payment_date: None,
            },
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn consumption_is_elapsed_share_of_period() {
        let history = TierHistory {
            id: Uuid::nil(),
            member_id: None,
            tier_id: None,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 12, 27), // 360 days
            consumption_percentage: None,
        };
        let today = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(); // 89 days in
        let pct = consumption_percentage(&history, today);
        assert!((pct - 24.72).abs() < 0.01, "got {pct}");
    }

    #[test]
    fn consumption_clamps_to_bounds() {
        let history = TierHistory {
            id: Uuid::nil(),
            member_id: None,
            tier_id: None,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2027, 1, 1),
            consumption_percentage: None,
        };
        // Before the period starts.
        assert_eq!(
            consumption_percentage(&history, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            0.0
        );
        // After the period ends.
        assert_eq!(
            consumption_percentage(&history, NaiveDate::from_ymd_opt(2028, 1, 1).unwrap()),
            100.0
        );
    }

    #[test]
    fn consumption_without_dates_is_zero() {
        let history = TierHistory {
            id: Uuid::nil(),
            member_id: None,
            tier_id: None,
            start_date: None,
            end_date: None,
            consumption_percentage: None,
        };
        assert_eq!(
            consumption_percentage(&history, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()),
            0.0
        );
    }

    #[test]
    fn membership_window_defaults_to_twelve_months() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let (s, e) = membership_window(start, None).unwrap();
        assert_eq!(s, start);
        assert_eq!(e, NaiveDate::from_ymd_opt(2027, 3, 1).unwrap());
    }
}
