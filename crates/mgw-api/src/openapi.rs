//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Membership Gateway API",
        version = "0.3.2",
        description = "Integration façade between the customer-facing systems (membership portal, ticketing, donations) and the Dataverse CRM.",
        license(name = "MIT")
    ),
    paths(
        // Customers
        crate::routes::customers::create_customer,
        crate::routes::customers::update_customer,
        crate::routes::customers::get_customer_detail,
        // Consents
        crate::routes::consents::update_subscription,
        crate::routes::consents::update_pics,
        // Activation
        crate::routes::activation::validate_code,
        crate::routes::activation::activate_membership,
        // Paid membership
        crate::routes::membership::purchase_before_payment,
        crate::routes::membership::purchase_after_payment,
        crate::routes::membership::upgrade_membership,
        crate::routes::membership::renew_membership,
        // Groups
        crate::routes::groups::add_group_member,
        // Donations
        crate::routes::donations::create_donations,
        // Events
        crate::routes::events::create_event_transactions,
        crate::routes::events::update_attendance,
    ),
    components(schemas(
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Customer DTOs
        crate::routes::customers::CreateCustomerRequest,
        crate::routes::customers::CustomerInput,
        crate::routes::customers::CreateCustomerResponse,
        crate::routes::customers::CustomerResult,
        crate::routes::customers::UpdateCustomerRequest,
        crate::routes::customers::CustomerUpdateInput,
        crate::routes::customers::UpdateCustomerResponse,
        crate::routes::customers::CustomerUpdateResult,
        crate::routes::customers::GetCustomerDetailRequest,
        crate::routes::customers::GetCustomerDetailResponse,
        crate::routes::customers::CustomerDetail,
        // Consent DTOs
        crate::routes::consents::UpdateSubscriptionRequest,
        crate::routes::consents::SubscriptionInput,
        crate::routes::consents::UpdatePicsRequest,
        crate::routes::consents::PicsInput,
        crate::routes::consents::ConsentResponse,
        crate::routes::consents::ConsentResult,
        // Activation DTOs
        crate::routes::activation::ActivationCodeValidationRequest,
        crate::routes::activation::ActivationCodeValidationResponse,
        crate::routes::activation::MembershipActivationRequest,
        crate::routes::activation::ActivationCustomer,
        crate::routes::activation::MembershipActivationResponse,
        // Paid membership DTOs
        crate::routes::membership::PaymentInput,
        crate::routes::membership::PurchaseBeforePaymentRequest,
        crate::routes::membership::MemberInput,
        crate::routes::membership::PurchaseBeforePaymentResponse,
        crate::routes::membership::MemberResult,
        crate::routes::membership::PurchaseAfterPaymentRequest,
        crate::routes::membership::PurchaseAfterPaymentResponse,
        crate::routes::membership::MembershipUpgradeRequest,
        crate::routes::membership::MembershipUpgradeResponse,
        crate::routes::membership::MembershipRenewalRequest,
        crate::routes::membership::MembershipRenewalResponse,
        // Group DTOs
        crate::routes::groups::AddGroupMemberRequest,
        crate::routes::groups::AddGroupMemberResponse,
        // Donation DTOs
        crate::routes::donations::CreateDonationRequest,
        crate::routes::donations::DonationInput,
        crate::routes::donations::CreateDonationResponse,
        crate::routes::donations::DonationResult,
        // Event DTOs
        crate::routes::events::CreateEventTransactionRequest,
        crate::routes::events::EventTransactionInput,
        crate::routes::events::CreateEventTransactionResponse,
        crate::routes::events::EventTransactionResult,
        crate::routes::events::UpdateAttendanceRequest,
        crate::routes::events::AttendanceInput,
        crate::routes::events::UpdateAttendanceResponse,
        crate::routes::events::AttendanceResult,
    )),
    tags(
        (name = "customers", description = "Contact creation, update, and lookup"),
        (name = "consents", description = "Subscription and PICS consent flags"),
        (name = "activation", description = "Activation code validation and redemption"),
        (name = "membership", description = "Paid membership purchase, upgrade, renewal"),
        (name = "groups", description = "Membership group member management"),
        (name = "donations", description = "Online donation transactions"),
        (name = "events", description = "Event transactions and attendance"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json — Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_contains_every_endpoint_path() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for endpoint in [
            "CreateCustomerWS",
            "UpdateCustomerWS",
            "GetCustomerDetailWS",
            "UpdateCustomerSubscriptionWS",
            "UpdateCustomerPICSWS",
            "ActivationCodeValidation",
            "MembershipActivationWS",
            "PaidMembershipPurchaseBeforePayment",
            "PaidMembershipPurchaseAfterPayment",
            "MembershipUpgradeWS",
            "MembershipRenewalWS",
            "AddMembershipGroupMemberWS",
            "CreateOnlineDonationTransactionWS",
            "CreateEventTransactionWS",
            "UpdateEventAttendanceWS",
        ] {
            assert!(
                paths
                    .iter()
                    .any(|p| p.ends_with(&format!("/services/apexrest/WKCDA/{endpoint}"))),
                "missing path for {endpoint}"
            );
        }
    }
}
