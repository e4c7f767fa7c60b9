//! # Customer Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/CreateCustomerWS` — batch contact creation
//! - `POST /services/apexrest/WKCDA/UpdateCustomerWS` — batch contact update
//! - `POST /services/apexrest/WKCDA/GetCustomerDetailWS` — single profile fetch
//!
//! Result lists mirror input order exactly; a failing item never affects
//! its siblings.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mgw_core::{looks_like_base64, Email, MasterCustomerId, Phone};
use mgw_crm_client::contacts::{ContactUpdate, CrmContact, NewContact};

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::resolver::{ContactResolver, MatchStrategy};
use crate::routes::{require_crm, ROUTE_PREFIX};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Batch request to create customers.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCustomerRequest {
    pub customers: Vec<CustomerInput>,
}

/// One customer to create.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    /// Gender display label, resolved against CRM metadata.
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub customer_source: Option<String>,
    #[serde(default, rename = "EMarketingConsent")]
    pub e_marketing_consent: Option<bool>,
    #[serde(default, rename = "PICSConsent")]
    pub pics_consent: Option<bool>,
    /// Profile photo: either a URL or inline Base64 image data.
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl Validate for CreateCustomerRequest {
    fn validate(&self) -> Result<(), String> {
        if self.customers.is_empty() {
            return Err("Customers list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch response for customer creation.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCustomerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub customers: Vec<CustomerResult>,
}

impl CreateCustomerResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            customers: Vec::new(),
        }
    }
}

/// Per-customer result, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub email: String,
    /// Present on success, and on duplicate-email failures (echoing the
    /// existing customer's identifier).
    #[serde(rename = "MasterCustomerID", skip_serializing_if = "Option::is_none")]
    pub master_customer_id: Option<String>,
    #[serde(rename = "ContactID", skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<Uuid>,
}

impl CustomerResult {
    fn failure(email: &str, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            email: email.to_string(),
            master_customer_id: None,
            contact_id: None,
        }
    }
}

/// Batch request to update customers by master customer ID.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateCustomerRequest {
    pub customers: Vec<CustomerUpdateInput>,
}

/// One customer update. Only present fields are written.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerUpdateInput {
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub preferred_language: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

impl Validate for UpdateCustomerRequest {
    fn validate(&self) -> Result<(), String> {
        if self.customers.is_empty() {
            return Err("Customers list must not be empty".to_string());
        }
        Ok(())
    }
}

/// Batch response for customer updates.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateCustomerResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub customers: Vec<CustomerUpdateResult>,
}

impl UpdateCustomerResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            customers: Vec::new(),
        }
    }
}

/// Per-update result, in input order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerUpdateResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "MasterCustomerID")]
    pub master_customer_id: String,
}

impl CustomerUpdateResult {
    fn failure(master_customer_id: &str, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            master_customer_id: master_customer_id.to_string(),
        }
    }
}

/// Request to fetch one customer profile.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct GetCustomerDetailRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "MasterCustomerID")]
    pub master_customer_id: Option<String>,
}

impl Validate for GetCustomerDetailRequest {
    fn validate(&self) -> Result<(), String> {
        if self.email.is_none() && self.master_customer_id.is_none() {
            return Err("Either Email or MasterCustomerID is required".to_string());
        }
        Ok(())
    }
}

/// Response carrying one customer profile.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct GetCustomerDetailResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<CustomerDetail>,
}

impl GetCustomerDetailResponse {
    fn rejected(remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            customer: None,
        }
    }
}

/// Customer profile fields exposed to callers.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "MasterCustomerID", skip_serializing_if = "Option::is_none")]
    pub master_customer_id: Option<String>,
    #[serde(rename = "EMarketingConsent", skip_serializing_if = "Option::is_none")]
    pub e_marketing_consent: Option<bool>,
    #[serde(rename = "PICSConsent", skip_serializing_if = "Option::is_none")]
    pub pics_consent: Option<bool>,
}

impl From<CrmContact> for CustomerDetail {
    fn from(contact: CrmContact) -> Self {
        Self {
            email: contact.email,
            first_name: contact.first_name,
            last_name: contact.last_name,
            phone: contact.phone,
            master_customer_id: contact.master_customer_id,
            e_marketing_consent: contact.e_marketing_consent,
            pics_consent: contact.pics_consent,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the customers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{ROUTE_PREFIX}/CreateCustomerWS"),
            post(create_customer),
        )
        .route(
            &format!("{ROUTE_PREFIX}/UpdateCustomerWS"),
            post(update_customer),
        )
        .route(
            &format!("{ROUTE_PREFIX}/GetCustomerDetailWS"),
            post(get_customer_detail),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/CreateCustomerWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/CreateCustomerWS",
    request_body = CreateCustomerRequest,
    responses(
        (status = 200, description = "Per-customer results", body = CreateCustomerResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    body: Result<Json<CreateCustomerRequest>, JsonRejection>,
) -> Result<Json<CreateCustomerResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(CreateCustomerResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(CreateCustomerResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;
    let resolver = ContactResolver::new(crm.contacts());

    let mut results = Vec::with_capacity(req.customers.len());
    for input in &req.customers {
        results.push(create_one_customer(crm, &resolver, input).await?);
    }

    let success = results.iter().all(|r| r.success);
    Ok(Json(CreateCustomerResponse {
        success,
        remarks: None,
        customers: results,
    }))
}

/// Process one customer row. CRM write failures fail the row, not the
/// batch; credential rejections abort the request.
async fn create_one_customer(
    crm: &mgw_crm_client::CrmClient,
    resolver: &ContactResolver<'_>,
    input: &CustomerInput,
) -> Result<CustomerResult, AppError> {
    let email = match Email::new(&input.email) {
        Ok(email) => email,
        Err(err) => return Ok(CustomerResult::failure(&input.email, err.to_string())),
    };
    let phone = match &input.phone {
        Some(raw) => match Phone::new(raw) {
            Ok(phone) => Some(phone),
            Err(err) => return Ok(CustomerResult::failure(&input.email, err.to_string())),
        },
        None => None,
    };

    // Duplicate check: first match wins, existing identifier echoed back.
    if let Some(existing) = resolver
        .resolve(email.as_str(), None, MatchStrategy::ExactEmail)
        .await?
    {
        return Ok(CustomerResult {
            success: false,
            remarks: Some("A customer with this email already exists".to_string()),
            email: input.email.clone(),
            master_customer_id: existing.master_customer_id,
            contact_id: Some(existing.id),
        });
    }

    // Caller-supplied option-set labels: a miss fails the row.
    let gender_value = match &input.gender {
        Some(label) => match crm
            .metadata()
            .option_value("contact", "gendercode", label)
            .await?
        {
            Some(value) => Some(value),
            None => {
                return Ok(CustomerResult::failure(
                    &input.email,
                    format!("Unknown Gender value '{label}'"),
                ))
            }
        },
        None => None,
    };
    let preferred_language_value = match &input.preferred_language {
        Some(label) => match crm
            .metadata()
            .option_value("contact", "wkcda_preferredlanguage", label)
            .await?
        {
            Some(value) => Some(value),
            None => {
                return Ok(CustomerResult::failure(
                    &input.email,
                    format!("Unknown PreferredLanguage value '{label}'"),
                ))
            }
        },
        None => None,
    };
    let customer_source_value = match &input.customer_source {
        Some(label) => match crm
            .metadata()
            .option_value("contact", "wkcda_customersource", label)
            .await?
        {
            Some(value) => Some(value),
            None => {
                return Ok(CustomerResult::failure(
                    &input.email,
                    format!("Unknown CustomerSource value '{label}'"),
                ))
            }
        },
        None => None,
    };

    // Profile photo: inline Base64 data and URLs land in different columns.
    let (photo_url, photo_data) = match &input.profile_picture {
        Some(payload) if looks_like_base64(payload) => (None, Some(payload.clone())),
        Some(url) => (Some(url.clone()), None),
        None => (None, None),
    };

    let master_customer_id = MasterCustomerId::generate(Utc::now());
    let new_contact = NewContact {
        email: email.as_str().to_string(),
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        master_customer_id: master_customer_id.as_str().to_string(),
        phone: phone.map(|p| p.as_str().to_string()),
        birth_date: input.birth_date,
        gender_value,
        preferred_language_value,
        customer_source_value,
        e_marketing_consent: input.e_marketing_consent,
        pics_consent: input.pics_consent,
        photo_url,
        photo_data,
    };

    match crm.contacts().create(&new_contact).await {
        Ok(created) => Ok(CustomerResult {
            success: true,
            remarks: None,
            email: input.email.clone(),
            master_customer_id: Some(master_customer_id.as_str().to_string()),
            contact_id: Some(created.id),
        }),
        Err(err) if err.is_authorization_failure() => Err(err.into()),
        Err(err) => {
            tracing::error!(email = %input.email, error = %err, "contact create failed");
            Ok(CustomerResult::failure(&input.email, "CRM write failed"))
        }
    }
}

/// POST /services/apexrest/WKCDA/UpdateCustomerWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/UpdateCustomerWS",
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Per-customer results", body = UpdateCustomerResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    body: Result<Json<UpdateCustomerRequest>, JsonRejection>,
) -> Result<Json<UpdateCustomerResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(UpdateCustomerResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(UpdateCustomerResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let mut results = Vec::with_capacity(req.customers.len());
    for input in &req.customers {
        results.push(update_one_customer(crm, input).await?);
    }

    let success = results.iter().all(|r| r.success);
    Ok(Json(UpdateCustomerResponse {
        success,
        remarks: None,
        customers: results,
    }))
}

async fn update_one_customer(
    crm: &mgw_crm_client::CrmClient,
    input: &CustomerUpdateInput,
) -> Result<CustomerUpdateResult, AppError> {
    let mcid = &input.master_customer_id;
    if let Err(err) = MasterCustomerId::new(mcid) {
        return Ok(CustomerUpdateResult::failure(mcid, err.to_string()));
    }

    let contact = match crm.contacts().find_by_master_customer_id(mcid).await? {
        Some(contact) => contact,
        None => {
            return Ok(CustomerUpdateResult::failure(
                mcid,
                format!("No customer found for MasterCustomerID '{mcid}'"),
            ))
        }
    };

    let phone = match &input.phone {
        Some(raw) => match Phone::new(raw) {
            Ok(phone) => Some(phone.as_str().to_string()),
            Err(err) => return Ok(CustomerUpdateResult::failure(mcid, err.to_string())),
        },
        None => None,
    };
    let gender_value = match &input.gender {
        Some(label) => match crm
            .metadata()
            .option_value("contact", "gendercode", label)
            .await?
        {
            Some(value) => Some(value),
            None => {
                return Ok(CustomerUpdateResult::failure(
                    mcid,
                    format!("Unknown Gender value '{label}'"),
                ))
            }
        },
        None => None,
    };
    let preferred_language_value = match &input.preferred_language {
        Some(label) => match crm
            .metadata()
            .option_value("contact", "wkcda_preferredlanguage", label)
            .await?
        {
            Some(value) => Some(value),
            None => {
                return Ok(CustomerUpdateResult::failure(
                    mcid,
                    format!("Unknown PreferredLanguage value '{label}'"),
                ))
            }
        },
        None => None,
    };
    let (photo_url, photo_data) = match &input.profile_picture {
        Some(payload) if looks_like_base64(payload) => (None, Some(payload.clone())),
        Some(url) => (Some(url.clone()), None),
        None => (None, None),
    };

    let update = ContactUpdate {
        first_name: input.first_name.clone(),
        last_name: input.last_name.clone(),
        phone,
        birth_date: input.birth_date,
        gender_value,
        preferred_language_value,
        e_marketing_consent: None,
        pics_consent: None,
        consent_date: None,
        photo_url,
        photo_data,
    };

    match crm.contacts().update(contact.id, &update).await {
        Ok(_) => Ok(CustomerUpdateResult {
            success: true,
            remarks: None,
            master_customer_id: mcid.clone(),
        }),
        Err(err) if err.is_authorization_failure() => Err(err.into()),
        Err(err) => {
            tracing::error!(master_customer_id = %mcid, error = %err, "contact update failed");
            Ok(CustomerUpdateResult::failure(mcid, "CRM write failed"))
        }
    }
}

/// POST /services/apexrest/WKCDA/GetCustomerDetailWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/GetCustomerDetailWS",
    request_body = GetCustomerDetailRequest,
    responses(
        (status = 200, description = "Customer profile or not-found result", body = GetCustomerDetailResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "customers"
)]
pub async fn get_customer_detail(
    State(state): State<AppState>,
    body: Result<Json<GetCustomerDetailRequest>, JsonRejection>,
) -> Result<Json<GetCustomerDetailResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => return Ok(Json(GetCustomerDetailResponse::rejected(remark))),
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(GetCustomerDetailResponse::rejected(remark)));
    }
    let crm = require_crm(&state)?;

    let contact = if let Some(mcid) = &req.master_customer_id {
        crm.contacts().find_by_master_customer_id(mcid).await?
    } else if let Some(email) = &req.email {
        crm.contacts().find_by_email(&email.trim().to_lowercase()).await?
    } else {
        None
    };

    match contact {
        Some(contact) => Ok(Json(GetCustomerDetailResponse {
            success: true,
            remarks: None,
            customer: Some(contact.into()),
        })),
        None => Ok(Json(GetCustomerDetailResponse::rejected(
            "No customer found",
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_requires_customers() {
        let req = CreateCustomerRequest { customers: vec![] };
        assert!(req.validate().is_err());
    }

    #[test]
    fn detail_request_requires_a_key() {
        let req = GetCustomerDetailRequest {
            email: None,
            master_customer_id: None,
        };
        assert!(req.validate().is_err());

        let req = GetCustomerDetailRequest {
            email: Some("a@example.com".into()),
            master_customer_id: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn customer_input_roundtrips_through_json() {
        let json = serde_json::json!({
            "Email": "alice@example.com",
            "FirstName": "Alice",
            "LastName": "Lee",
            "Phone": "+85291234567",
            "BirthDate": "1990-05-01",
            "Gender": "Female",
            "PreferredLanguage": "English",
            "CustomerSource": "Portal",
            "EMarketingConsent": true,
            "PICSConsent": false,
            "ProfilePicture": "https://cdn.example.com/p.jpg"
        });
        let input: CustomerInput = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(input.email, "alice@example.com");
        assert_eq!(input.gender.as_deref(), Some("Female"));
        assert_eq!(input.e_marketing_consent, Some(true));

        // Serialization preserves every declared field name.
        let back = serde_json::to_value(&input).unwrap();
        assert_eq!(back["Email"], json["Email"]);
        assert_eq!(back["EMarketingConsent"], json["EMarketingConsent"]);
        assert_eq!(back["PICSConsent"], json["PICSConsent"]);
    }

    #[test]
    fn result_serializes_master_customer_id_key() {
        let result = CustomerResult {
            success: true,
            remarks: None,
            email: "a@example.com".into(),
            master_customer_id: Some("P17234567890123".into()),
            contact_id: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["MasterCustomerID"], "P17234567890123");
        assert_eq!(value["Success"], true);
    }
}
