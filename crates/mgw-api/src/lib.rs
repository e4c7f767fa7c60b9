//! # mgw-api — Axum HTTP Façade for the Membership Gateway
//!
//! Bridges the customer-facing systems (membership portal, ticketing,
//! donation platform) to the Dataverse CRM. Every endpoint accepts a JSON
//! request, validates it, performs a sequence of CRM reads and writes via
//! `mgw-crm-client`, and answers with per-record success/failure.
//!
//! ## API Surface
//!
//! | Endpoint (POST under `/services/apexrest/WKCDA/`) | Module                 |
//! |----------------------------------------------------|------------------------|
//! | `CreateCustomerWS`, `UpdateCustomerWS`, `GetCustomerDetailWS` | [`routes::customers`] |
//! | `UpdateCustomerSubscriptionWS`, `UpdateCustomerPICSWS` | [`routes::consents`] |
//! | `ActivationCodeValidation`, `MembershipActivationWS` | [`routes::activation`] |
//! | `PaidMembershipPurchaseBeforePayment`, `PaidMembershipPurchaseAfterPayment`, `MembershipUpgradeWS`, `MembershipRenewalWS` | [`routes::membership`] |
//! | `AddMembershipGroupMemberWS`                       | [`routes::groups`]     |
//! | `CreateOnlineDonationTransactionWS`                | [`routes::donations`]  |
//! | `CreateEventTransactionWS`, `UpdateEventAttendanceWS` | [`routes::events`]  |
//!
//! ## Response Contract
//!
//! Business outcomes — including malformed JSON and field validation — are
//! HTTP 200 with a structured envelope (`Success`, `Remarks`, per-item
//! results mirroring input order). 401 covers caller and CRM credential
//! failures, 502 upstream CRM faults, 503 a missing CRM client.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → RateLimitMiddleware → Handler
//! ```

pub mod auth;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod resolver;
pub mod routes;
pub mod state;

use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};
use crate::state::AppState;

pub use error::AppError;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = auth::AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let limiter = RateLimiter::new(RateLimitConfig::default());

    let api = Router::new()
        .merge(routes::customers::router())
        .merge(routes::consents::router())
        .merge(routes::activation::router())
        .merge(routes::membership::router())
        .merge(routes::groups::router())
        .merge(routes::donations::router())
        .merge(routes::events::router())
        .merge(openapi::router())
        .layer(from_fn(middleware::rate_limit::rate_limit_middleware))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .layer(axum::Extension(limiter))
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
