//! Typed client for the membership tables.
//!
//! Covers tiers, per-purchase tier histories, activation codes, and
//! membership groups:
//!
//! | Entity set                           | Records                         |
//! |--------------------------------------|---------------------------------|
//! | `wkcda_membershiptiers`              | purchasable tiers               |
//! | `wkcda_membershiptierhistories`      | one row per purchase/activation |
//! | `wkcda_membershipactivations`        | prepaid/gift activation codes   |
//! | `wkcda_membershipgroups`             | Family/Dual/Individual groups   |
//! | `wkcda_membershipgrouprelationships` | contact ↔ group links           |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CrmError;
use crate::types::{escape_odata, ODataList};
use crate::API_PREFIX;

// -- Record types -------------------------------------------------------------

/// A purchasable membership tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipTier {
    #[serde(rename = "wkcda_membershiptierid")]
    pub id: Uuid,
    #[serde(rename = "wkcda_tiername", default)]
    pub name: Option<String>,
    /// Group type option-set value.
    #[serde(rename = "wkcda_grouptype", default)]
    pub group_type_value: Option<i32>,
    /// Membership duration granted by this tier.
    #[serde(rename = "wkcda_validitymonths", default)]
    pub validity_months: Option<i32>,
    #[serde(rename = "wkcda_price", default)]
    pub price: Option<f64>,
}

/// A membership tier history row — one per purchase or activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierHistory {
    #[serde(rename = "wkcda_membershiptierhistoryid")]
    pub id: Uuid,
    #[serde(rename = "_wkcda_member_value", default)]
    pub member_id: Option<Uuid>,
    #[serde(rename = "_wkcda_tier_value", default)]
    pub tier_id: Option<Uuid>,
    #[serde(rename = "wkcda_startdate", default)]
    pub start_date: Option<NaiveDate>,
    #[serde(rename = "wkcda_enddate", default)]
    pub end_date: Option<NaiveDate>,
    /// Share of the membership period consumed when it was end-dated.
    #[serde(rename = "wkcda_consumptionpercentage", default)]
    pub consumption_percentage: Option<f64>,
}

/// Request body for tier history creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewTierHistory {
    #[serde(rename = "wkcda_Member@odata.bind")]
    pub member_bind: String,
    #[serde(rename = "wkcda_Tier@odata.bind")]
    pub tier_bind: String,
    #[serde(rename = "wkcda_startdate")]
    pub start_date: NaiveDate,
    #[serde(rename = "wkcda_enddate")]
    pub end_date: NaiveDate,
}

/// An activation-code record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    #[serde(rename = "wkcda_membershipactivationid")]
    pub id: Uuid,
    #[serde(rename = "wkcda_activationcode", default)]
    pub code: Option<String>,
    #[serde(rename = "wkcda_physicalcardserialnumber", default)]
    pub card_serial: Option<String>,
    /// Status option-set value (`New`/`Activated`, resolved via metadata).
    #[serde(rename = "wkcda_status", default)]
    pub status_value: Option<i32>,
    #[serde(rename = "wkcda_issuedate", default)]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(rename = "wkcda_activationdate", default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(rename = "_wkcda_tier_value", default)]
    pub tier_id: Option<Uuid>,
}

/// A membership group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipGroup {
    #[serde(rename = "wkcda_membershipgroupid")]
    pub id: Uuid,
    #[serde(rename = "wkcda_groupname", default)]
    pub name: Option<String>,
    /// Group type option-set value.
    #[serde(rename = "wkcda_grouptype", default)]
    pub group_type_value: Option<i32>,
}

/// Request body for group creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    #[serde(rename = "wkcda_groupname")]
    pub name: String,
    #[serde(rename = "wkcda_grouptype")]
    pub group_type_value: i32,
}

/// A contact ↔ group link carrying the member's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRelationship {
    #[serde(rename = "wkcda_membershipgrouprelationshipid")]
    pub id: Uuid,
    #[serde(rename = "_wkcda_group_value", default)]
    pub group_id: Option<Uuid>,
    #[serde(rename = "_wkcda_member_value", default)]
    pub member_id: Option<Uuid>,
    /// Member role option-set value.
    #[serde(rename = "wkcda_role", default)]
    pub role_value: Option<i32>,
}

/// Request body for group relationship creation.
#[derive(Debug, Clone, Serialize)]
pub struct NewGroupRelationship {
    #[serde(rename = "wkcda_Group@odata.bind")]
    pub group_bind: String,
    #[serde(rename = "wkcda_Member@odata.bind")]
    pub member_bind: String,
    #[serde(rename = "wkcda_role")]
    pub role_value: i32,
}

/// Patch body for marking an activation redeemed.
#[derive(Debug, Clone, Serialize)]
pub struct ActivationUpdate {
    #[serde(rename = "wkcda_status")]
    pub status_value: i32,
    #[serde(rename = "wkcda_RedeemedBy@odata.bind")]
    pub redeemed_by_bind: String,
    #[serde(rename = "wkcda_activationdate")]
    pub activated_at: DateTime<Utc>,
}

// -- Client -------------------------------------------------------------------

/// Client for the membership tables.
#[derive(Debug, Clone)]
pub struct MembershipClient {
    http: reqwest::Client,
    base_url: url::Url,
}

impl MembershipClient {
    pub(crate) fn new(http: reqwest::Client, base_url: url::Url) -> Self {
        Self { http, base_url }
    }

    // -- shared plumbing ------------------------------------------------------

    /// Filtered list query against an entity set.
    async fn query<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        entity_set: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, CrmError> {
        let url = format!("{}{}/{}", self.base_url, API_PREFIX, entity_set);

        let resp = crate::retry::retry_send(|| self.http.get(&url).query(query).send())
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

        let list: ODataList<T> = resp.json().await.map_err(|e| CrmError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })?;
        Ok(list.value)
    }

    /// Create a record, returning its representation.
    async fn create<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        entity_set: &str,
        body: &B,
    ) -> Result<T, CrmError> {
        let url = format!("{}{}/{}", self.base_url, API_PREFIX, entity_set);

        let resp = crate::retry::retry_send(|| {
            self.http
                .post(&url)
                .header("Prefer", "return=representation")
                .json(body)
                .send()
        })
        .await
        .map_err(|e| CrmError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CrmError::ApiError {
                endpoint: endpoint.into(),
                status,
                body: text,
            });
        }

        resp.json().await.map_err(|e| CrmError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }

    /// Patch a record by id, returning its representation.
    async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        entity_set: &str,
        id: Uuid,
        body: &B,
    ) -> Result<T, CrmError> {
        let url = format!("{}{}/{}({id})", self.base_url, API_PREFIX, entity_set);

        let resp = crate::retry::retry_send(|| {
            self.http
                .patch(&url)
                .header("If-Match", "*")
                .header("Prefer", "return=representation")
                .json(body)
                .send()
        })
        .await
        .map_err(|e| CrmError::Http {
            endpoint: endpoint.into(),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(CrmError::ApiError {
                endpoint: endpoint.into(),
                status,
                body: text,
            });
        }

        resp.json().await.map_err(|e| CrmError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }

    // -- tiers ----------------------------------------------------------------

    /// Find a tier by its display name. First match wins.
    pub async fn find_tier_by_name(&self, name: &str) -> Result<Option<MembershipTier>, CrmError> {
        let filter = format!("wkcda_tiername eq '{}'", escape_odata(name));
        let rows = self
            .query(
                "GET /wkcda_membershiptiers (by name)",
                "wkcda_membershiptiers",
                &[("$filter", filter.as_str()), ("$top", "1")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Find a tier by id.
    pub async fn find_tier_by_id(&self, id: Uuid) -> Result<Option<MembershipTier>, CrmError> {
        let filter = format!("wkcda_membershiptierid eq {id}");
        let rows = self
            .query(
                "GET /wkcda_membershiptiers (by id)",
                "wkcda_membershiptiers",
                &[("$filter", filter.as_str()), ("$top", "1")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    // -- tier histories -------------------------------------------------------

    /// Create a tier history row.
    pub async fn create_tier_history(
        &self,
        req: &NewTierHistory,
    ) -> Result<TierHistory, CrmError> {
        self.create(
            "POST /wkcda_membershiptierhistories",
            "wkcda_membershiptierhistories",
            req,
        )
        .await
    }

    /// End-date a tier history, recording the consumed share of the period.
    pub async fn end_tier_history(
        &self,
        id: Uuid,
        end_date: NaiveDate,
        consumption_percentage: f64,
    ) -> Result<TierHistory, CrmError> {
        #[derive(Serialize)]
        struct EndPatch {
            #[serde(rename = "wkcda_enddate")]
            end_date: NaiveDate,
            #[serde(rename = "wkcda_consumptionpercentage")]
            consumption_percentage: f64,
        }
        self.patch(
            &format!("PATCH /wkcda_membershiptierhistories/{id}"),
            "wkcda_membershiptierhistories",
            id,
            &EndPatch {
                end_date,
                consumption_percentage,
            },
        )
        .await
    }

    /// The contact's most recent tier history, by end date.
    pub async fn latest_tier_history_for_contact(
        &self,
        contact_id: Uuid,
    ) -> Result<Option<TierHistory>, CrmError> {
        let filter = format!("_wkcda_member_value eq {contact_id}");
        let rows = self
            .query(
                "GET /wkcda_membershiptierhistories (latest for contact)",
                "wkcda_membershiptierhistories",
                &[
                    ("$filter", filter.as_str()),
                    ("$orderby", "wkcda_enddate desc"),
                    ("$top", "1"),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    // -- activations ----------------------------------------------------------

    /// Find an activation record by its code.
    pub async fn find_activation_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Activation>, CrmError> {
        let filter = format!("wkcda_activationcode eq '{}'", escape_odata(code));
        let rows = self
            .query(
                "GET /wkcda_membershipactivations (by code)",
                "wkcda_membershipactivations",
                &[("$filter", filter.as_str()), ("$top", "1")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Find an activation record by physical card serial number.
    pub async fn find_activation_by_card_serial(
        &self,
        serial: &str,
    ) -> Result<Option<Activation>, CrmError> {
        let filter = format!(
            "wkcda_physicalcardserialnumber eq '{}'",
            escape_odata(serial)
        );
        let rows = self
            .query(
                "GET /wkcda_membershipactivations (by card serial)",
                "wkcda_membershipactivations",
                &[("$filter", filter.as_str()), ("$top", "1")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Mark an activation redeemed: status, redeemer, and activation date.
    pub async fn mark_activated(
        &self,
        id: Uuid,
        update: &ActivationUpdate,
    ) -> Result<Activation, CrmError> {
        self.patch(
            &format!("PATCH /wkcda_membershipactivations/{id}"),
            "wkcda_membershipactivations",
            id,
            update,
        )
        .await
    }

    // -- groups ---------------------------------------------------------------

    /// Create a membership group.
    pub async fn create_group(&self, req: &NewGroup) -> Result<MembershipGroup, CrmError> {
        self.create(
            "POST /wkcda_membershipgroups",
            "wkcda_membershipgroups",
            req,
        )
        .await
    }

    /// Find a group by id.
    pub async fn find_group(&self, id: Uuid) -> Result<Option<MembershipGroup>, CrmError> {
        let filter = format!("wkcda_membershipgroupid eq {id}");
        let rows = self
            .query(
                "GET /wkcda_membershipgroups (by id)",
                "wkcda_membershipgroups",
                &[("$filter", filter.as_str()), ("$top", "1")],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// List the relationships (members) of a group.
    pub async fn list_group_members(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<GroupRelationship>, CrmError> {
        let filter = format!("_wkcda_group_value eq {group_id}");
        self.query(
            "GET /wkcda_membershipgrouprelationships (by group)",
            "wkcda_membershipgrouprelationships",
            &[("$filter", filter.as_str())],
        )
        .await
    }

    /// Link a contact into a group with a role.
    pub async fn create_group_relationship(
        &self,
        req: &NewGroupRelationship,
    ) -> Result<GroupRelationship, CrmError> {
        self.create(
            "POST /wkcda_membershipgrouprelationships",
            "wkcda_membershipgrouprelationships",
            req,
        )
        .await
    }
}
