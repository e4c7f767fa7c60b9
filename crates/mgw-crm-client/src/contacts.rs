//! Typed client for the `contacts` entity set.
//!
//! Contacts are the anchor record for every gateway operation: customers,
//! members, donors, and attendees are all contacts. The gateway reads them
//! by email, phone, or master customer ID, and creates or patches them with
//! the columns below.
//!
//! | Method | Request                               | Operation            |
//! |--------|----------------------------------------|----------------------|
//! | GET    | `/contacts?$filter=…&$top=1`           | point lookups        |
//! | POST   | `/contacts`                            | create (returns rep) |
//! | PATCH  | `/contacts({id})`                      | update (returns rep) |

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrmError;
use crate::types::{escape_odata, ODataList};
use crate::API_PREFIX;

/// Columns selected on every contact read.
const CONTACT_SELECT: &str = "contactid,emailaddress1,firstname,lastname,mobilephone,birthdate,\
                              gendercode,wkcda_mastercustomerid,wkcda_emarketingconsent,\
                              wkcda_picsconsent";

/// Contact as returned by the Dataverse Web API.
///
/// Fields use `#[serde(default)]` for resilience against schema evolution —
/// the live environment may omit columns or add new ones, and
/// `serde(deny_unknown_fields)` is intentionally NOT used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmContact {
    /// Primary key.
    #[serde(rename = "contactid")]
    pub id: Uuid,
    #[serde(rename = "emailaddress1", default)]
    pub email: Option<String>,
    #[serde(rename = "firstname", default)]
    pub first_name: Option<String>,
    #[serde(rename = "lastname", default)]
    pub last_name: Option<String>,
    #[serde(rename = "mobilephone", default)]
    pub phone: Option<String>,
    #[serde(rename = "birthdate", default)]
    pub birth_date: Option<NaiveDate>,
    /// Gender option-set value (resolved against metadata by callers).
    #[serde(rename = "gendercode", default)]
    pub gender_value: Option<i32>,
    #[serde(rename = "wkcda_mastercustomerid", default)]
    pub master_customer_id: Option<String>,
    #[serde(rename = "wkcda_emarketingconsent", default)]
    pub e_marketing_consent: Option<bool>,
    #[serde(rename = "wkcda_picsconsent", default)]
    pub pics_consent: Option<bool>,
}

/// Request body for contact creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewContact {
    #[serde(rename = "emailaddress1")]
    pub email: String,
    #[serde(rename = "firstname")]
    pub first_name: String,
    #[serde(rename = "lastname")]
    pub last_name: String,
    #[serde(rename = "wkcda_mastercustomerid")]
    pub master_customer_id: String,
    #[serde(rename = "mobilephone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "birthdate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "gendercode", skip_serializing_if = "Option::is_none")]
    pub gender_value: Option<i32>,
    #[serde(rename = "wkcda_preferredlanguage", skip_serializing_if = "Option::is_none")]
    pub preferred_language_value: Option<i32>,
    #[serde(rename = "wkcda_customersource", skip_serializing_if = "Option::is_none")]
    pub customer_source_value: Option<i32>,
    #[serde(rename = "wkcda_emarketingconsent", skip_serializing_if = "Option::is_none")]
    pub e_marketing_consent: Option<bool>,
    #[serde(rename = "wkcda_picsconsent", skip_serializing_if = "Option::is_none")]
    pub pics_consent: Option<bool>,
    #[serde(rename = "wkcda_photourl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "wkcda_photodata", skip_serializing_if = "Option::is_none")]
    pub photo_data: Option<String>,
}

/// Request body for contact updates. Only present fields are patched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactUpdate {
    #[serde(rename = "firstname", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "lastname", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "mobilephone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "birthdate", skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(rename = "gendercode", skip_serializing_if = "Option::is_none")]
    pub gender_value: Option<i32>,
    #[serde(rename = "wkcda_preferredlanguage", skip_serializing_if = "Option::is_none")]
    pub preferred_language_value: Option<i32>,
    #[serde(rename = "wkcda_emarketingconsent", skip_serializing_if = "Option::is_none")]
    pub e_marketing_consent: Option<bool>,
    #[serde(rename = "wkcda_picsconsent", skip_serializing_if = "Option::is_none")]
    pub pics_consent: Option<bool>,
    #[serde(rename = "wkcda_consentdate", skip_serializing_if = "Option::is_none")]
    pub consent_date: Option<NaiveDate>,
    #[serde(rename = "wkcda_photourl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(rename = "wkcda_photodata", skip_serializing_if = "Option::is_none")]
    pub photo_data: Option<String>,
}

// -- Client -------------------------------------------------------------------

/// Client for the `contacts` entity set.
#[derive(Debug, Clone)]
pub struct ContactClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl ContactClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    /// Find a contact by exact email match.
    ///
    /// Calls `GET {base_url}/api/data/v9.2/contacts` with an equality filter.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<CrmContact>, CrmError> {
        let filter = format!("emailaddress1 eq '{}'", escape_odata(email));
        self.find_one("GET /contacts (by email)", &filter).await
    }

    /// Find a contact matching either the email or the phone number.
    ///
    /// OR-filter fallback used by the email-then-phone resolution strategy.
    pub async fn find_by_email_or_phone(
        &self,
        email: &str,
        phone: &str,
    ) -> Result<Option<CrmContact>, CrmError> {
        let filter = format!(
            "(emailaddress1 eq '{}' or mobilephone eq '{}')",
            escape_odata(email),
            escape_odata(phone)
        );
        self.find_one("GET /contacts (by email or phone)", &filter)
            .await
    }

    /// Find a contact by master customer ID.
    pub async fn find_by_master_customer_id(
        &self,
        master_customer_id: &str,
    ) -> Result<Option<CrmContact>, CrmError> {
        let filter = format!(
            "wkcda_mastercustomerid eq '{}'",
            escape_odata(master_customer_id)
        );
        self.find_one("GET /contacts (by master customer id)", &filter)
            .await
    }

    /// Shared single-record query: first match wins.
    async fn find_one(
        &self,
        endpoint: &str,
        filter: &str,
    ) -> Result<Option<CrmContact>, CrmError> {
        let url = format!("{}{}/contacts", self.base_url, API_PREFIX);

        let resp = crate::retry::retry_send(|| {
            self.http
                .get(&url)
                .query(&[
                    ("$select", CONTACT_SELECT),
                    ("$filter", filter),
                    ("$top", "1"),
                ])
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

        let list: ODataList<CrmContact> =
            resp.json().await.map_err(|e| CrmError::Deserialization {
                endpoint: endpoint.into(),
                source: e,
            })?;
        Ok(list.value.into_iter().next())
    }

    /// Create a contact.
    ///
    /// Calls `POST {base_url}/api/data/v9.2/contacts` with
    /// `Prefer: return=representation` so the created record (including its
    /// `contactid`) comes back in one round-trip.
    pub async fn create(&self, req: &NewContact) -> Result<CrmContact, CrmError> {
        let endpoint = "POST /contacts";
        let url = format!("{}{}/contacts", self.base_url, API_PREFIX);

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

    /// Patch an existing contact.
    ///
    /// Calls `PATCH {base_url}/api/data/v9.2/contacts({id})` with
    /// `If-Match: *` (unconditional update; the gateway holds no
    /// concurrency token).
    pub async fn update(
        &self,
        id: Uuid,
        req: &ContactUpdate,
    ) -> Result<CrmContact, CrmError> {
        let endpoint = format!("PATCH /contacts/{id}");
        let url = format!("{}{}/contacts({id})", self.base_url, API_PREFIX);

        let resp = crate::retry::retry_send(|| {
            self.http
                .patch(&url)
                .header("If-Match", "*")
                .header("Prefer", "return=representation")
                .json(req)
                .send()
        })
        .await
        .map_err(|e| CrmError::Http {
            endpoint: endpoint.clone(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(CrmError::ApiError {
                endpoint,
                status,
                body,
            });
        }

        resp.json().await.map_err(|e| CrmError::Deserialization {
            endpoint,
            source: e,
        })
    }
}
