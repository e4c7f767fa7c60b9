//! # Group Membership Endpoints
//!
//! ## Endpoints
//!
//! - `POST /services/apexrest/WKCDA/AddMembershipGroupMemberWS` — add a
//!   member to an existing group
//!
//! Capacity is checked against the group's current member count before
//! the insert. The count and the insert are separate CRM calls.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use mgw_core::{check_group_capacity, Email, GroupType, MemberRole, Phone};
use mgw_crm_client::memberships::NewGroupRelationship;
use mgw_crm_client::types::bind;
use mgw_crm_client::CrmClient;

use crate::error::AppError;
use crate::extractors::{extract_json, Validate};
use crate::resolver::{ContactResolver, ContactTemplate, MatchStrategy};
use crate::routes::membership::MemberInput;
use crate::routes::{require_crm, system_option, ROUTE_PREFIX};
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to add one member to an existing group.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct AddGroupMemberRequest {
    #[serde(rename = "GroupID")]
    pub group_id: Uuid,
    pub member: MemberInput,
}

impl Validate for AddGroupMemberRequest {
    fn validate(&self) -> Result<(), String> {
        if MemberRole::from_label(&self.member.role).is_none() {
            return Err(format!("Unknown Role value '{}'", self.member.role));
        }
        if self.member.email.trim().is_empty() {
            return Err("Member email is required".to_string());
        }
        Ok(())
    }
}

/// Outcome of the member insert.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct AddGroupMemberResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(rename = "GroupID")]
    pub group_id: Uuid,
    #[serde(rename = "MasterCustomerID", skip_serializing_if = "Option::is_none")]
    pub master_customer_id: Option<String>,
}

impl AddGroupMemberResponse {
    fn rejected(group_id: Uuid, remark: impl Into<String>) -> Self {
        Self {
            success: false,
            remarks: Some(remark.into()),
            group_id,
            master_customer_id: None,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────

/// Build the groups router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        &format!("{ROUTE_PREFIX}/AddMembershipGroupMemberWS"),
        post(add_group_member),
    )
}

/// Map a group's persisted type value back to [`GroupType`].
async fn group_type_from_value(crm: &CrmClient, value: i32) -> Result<Option<GroupType>, AppError> {
    for group_type in [GroupType::Individual, GroupType::Dual, GroupType::Family] {
        let candidate = system_option(
            crm,
            "wkcda_membershipgroup",
            "wkcda_grouptype",
            group_type.as_label(),
        )
        .await?;
        if candidate == value {
            return Ok(Some(group_type));
        }
    }
    Ok(None)
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /services/apexrest/WKCDA/AddMembershipGroupMemberWS
#[utoipa::path(
    post,
    path = "/services/apexrest/WKCDA/AddMembershipGroupMemberWS",
    request_body = AddGroupMemberRequest,
    responses(
        (status = 200, description = "Insert outcome", body = AddGroupMemberResponse),
        (status = 502, description = "CRM failure", body = crate::error::ErrorBody),
        (status = 503, description = "CRM client not configured", body = crate::error::ErrorBody),
    ),
    tag = "groups"
)]
pub async fn add_group_member(
    State(state): State<AppState>,
    body: Result<Json<AddGroupMemberRequest>, JsonRejection>,
) -> Result<Json<AddGroupMemberResponse>, AppError> {
    let req = match extract_json(body) {
        Ok(req) => req,
        Err(remark) => {
            return Ok(Json(AddGroupMemberResponse::rejected(Uuid::nil(), remark)))
        }
    };
    if let Err(remark) = req.validate() {
        return Ok(Json(AddGroupMemberResponse::rejected(req.group_id, remark)));
    }
    let crm = require_crm(&state)?;

    let group = match crm.memberships().find_group(req.group_id).await? {
        Some(group) => group,
        None => {
            return Ok(Json(AddGroupMemberResponse::rejected(
                req.group_id,
                format!("No membership group found for GroupID '{}'", req.group_id),
            )))
        }
    };
    let group_type = match group.group_type_value {
        Some(value) => group_type_from_value(crm, value).await?,
        None => None,
    };
    let Some(group_type) = group_type else {
        return Err(AppError::Upstream(format!(
            "group {} has an unrecognized group type",
            group.id
        )));
    };

    let email = match Email::new(&req.member.email) {
        Ok(email) => email,
        Err(err) => {
            return Ok(Json(AddGroupMemberResponse::rejected(
                req.group_id,
                err.to_string(),
            )))
        }
    };
    let phone = match &req.member.phone {
        Some(raw) => match Phone::new(raw) {
            Ok(phone) => Some(phone),
            Err(err) => {
                return Ok(Json(AddGroupMemberResponse::rejected(
                    req.group_id,
                    err.to_string(),
                )))
            }
        },
        None => None,
    };
    let Some(role) = MemberRole::from_label(&req.member.role) else {
        return Ok(Json(AddGroupMemberResponse::rejected(
            req.group_id,
            format!("Unknown Role value '{}'", req.member.role),
        )));
    };

    // Capacity and primary-uniqueness checks against the current members.
    let members = crm.memberships().list_group_members(group.id).await?;
    if let Err(err) = check_group_capacity(group_type, members.len()) {
        return Ok(Json(AddGroupMemberResponse::rejected(
            req.group_id,
            err.to_string(),
        )));
    }
    let role_value = system_option(
        crm,
        "wkcda_membershipgrouprelationship",
        "wkcda_role",
        role.as_label(),
    )
    .await?;
    if role == MemberRole::Primary {
        let primary_value = role_value;
        if members
            .iter()
            .any(|m| m.role_value == Some(primary_value))
        {
            return Ok(Json(AddGroupMemberResponse::rejected(
                req.group_id,
                "Group already has a primary member",
            )));
        }
    }

    let resolver = ContactResolver::new(crm.contacts());
    let resolved = resolver
        .resolve_or_create(
            ContactTemplate {
                email: email.as_str(),
                first_name: req.member.first_name.as_deref(),
                last_name: req.member.last_name.as_deref(),
                phone: phone.as_ref().map(|p| p.as_str()),
                customer_source_value: None,
            },
            MatchStrategy::EmailThenPhone,
        )
        .await?;

    crm.memberships()
        .create_group_relationship(&NewGroupRelationship {
            group_bind: bind("wkcda_membershipgroups", group.id),
            member_bind: bind("contacts", resolved.contact.id),
            role_value,
        })
        .await?;

    tracing::info!(group_id = %group.id, role = %role, "group member added");
    Ok(Json(AddGroupMemberResponse {
        success: true,
        remarks: None,
        group_id: group.id,
        master_customer_id: resolved.contact.master_customer_id.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_unknown_role() {
        let req = AddGroupMemberRequest {
            group_id: Uuid::nil(),
            member: MemberInput {
                role: "Observer".into(),
                email: "a@example.com".into(),
                first_name: None,
                last_name: None,
                phone: None,
            },
        };
        assert!(req.validate().unwrap_err().contains("Role"));
    }

    #[test]
    fn request_requires_email() {
        let req = AddGroupMemberRequest {
            group_id: Uuid::nil(),
            member: MemberInput {
                role: "Add-on Member".into(),
                email: " ".into(),
                first_name: None,
                last_name: None,
                phone: None,
            },
        };
        assert!(req.validate().is_err());
    }
}
