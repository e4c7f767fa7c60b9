//! # Gateway Routes
//!
//! One module per endpoint family, each exposing a `router()` that mounts
//! its POST endpoints under `/services/apexrest/WKCDA/`.
//!
//! | Module       | Endpoints                                              |
//! |--------------|--------------------------------------------------------|
//! | `customers`  | CreateCustomerWS, UpdateCustomerWS, GetCustomerDetailWS |
//! | `consents`   | UpdateCustomerSubscriptionWS, UpdateCustomerPICSWS     |
//! | `activation` | ActivationCodeValidation, MembershipActivationWS       |
//! | `membership` | PaidMembershipPurchaseBeforePayment/AfterPayment, MembershipUpgradeWS, MembershipRenewalWS |
//! | `groups`     | AddMembershipGroupMemberWS                             |
//! | `donations`  | CreateOnlineDonationTransactionWS                      |
//! | `events`     | CreateEventTransactionWS, UpdateEventAttendanceWS      |

pub mod activation;
pub mod consents;
pub mod customers;
pub mod donations;
pub mod events;
pub mod groups;
pub mod membership;

use mgw_crm_client::CrmClient;

use crate::error::AppError;
use crate::state::AppState;

/// Route prefix shared by every endpoint.
pub(crate) const ROUTE_PREFIX: &str = "/services/apexrest/WKCDA";

/// Helper: extract the CRM client from AppState or return 503.
pub(crate) fn require_crm(state: &AppState) -> Result<&CrmClient, AppError> {
    state.crm.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "CRM client not configured. Set CRM_BASE_URL and CRM_API_TOKEN.".to_string(),
        )
    })
}

/// Resolve an option-set label the gateway itself depends on.
///
/// These labels (activation status, transaction kind, group type, member
/// role) are part of the CRM solution, not caller input — a miss means the
/// environment is misconfigured, so it maps to an upstream error rather
/// than a validation remark.
pub(crate) async fn system_option(
    crm: &CrmClient,
    entity: &str,
    attribute: &str,
    label: &str,
) -> Result<i32, AppError> {
    match crm.metadata().option_value(entity, attribute, label).await? {
        Some(value) => Ok(value),
        None => Err(AppError::Upstream(format!(
            "CRM option set {entity}.{attribute} has no '{label}' option"
        ))),
    }
}
