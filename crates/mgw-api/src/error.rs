//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//!
//! Business-level outcomes (field validation, per-item failures, malformed
//! JSON) are NOT errors here — they travel in the 200 response envelopes.
//! `AppError` covers the transport-level contract only: caller
//! authentication, CRM availability, and internal faults. Raw upstream
//! error text is never exposed to callers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "UNAUTHORIZED", "UPSTREAM_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Caller authentication failure, or credential rejection by the CRM
    /// (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The CRM client is not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The CRM failed or answered unexpectedly (502). Details are logged,
    /// not returned.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Upstream and internal details stay in the logs.
        let message = match &self {
            Self::Upstream(_) => "The CRM backend could not complete the request".to_string(),
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Upstream(detail) => tracing::error!(%detail, "upstream CRM failure"),
            Self::Internal(detail) => tracing::error!(%detail, "internal server error"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert CRM client errors to API errors.
///
/// Credential rejections by the CRM surface as the gateway's own 401;
/// everything else is an upstream fault.
impl From<mgw_crm_client::CrmError> for AppError {
    fn from(err: mgw_crm_client::CrmError) -> Self {
        if err.is_authorization_failure() {
            tracing::warn!(error = %err, "CRM rejected gateway credentials");
            Self::Unauthorized("CRM rejected the gateway credentials".to_string())
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    /// Helper to extract status and body from a Response.
    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn unauthorized_status_code() {
        let err = AppError::Unauthorized("no token".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
    }

    #[test]
    fn service_unavailable_status_code() {
        let err = AppError::ServiceUnavailable("no CRM client".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn upstream_status_code() {
        let err = AppError::Upstream("CRM 500".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(code, "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn into_response_unauthorized() {
        let (status, body) = response_parts(AppError::Unauthorized("no token".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error.code, "UNAUTHORIZED");
        assert!(body.error.message.contains("no token"));
    }

    #[tokio::test]
    async fn into_response_upstream_hides_details() {
        let (status, body) =
            response_parts(AppError::Upstream("CRM returned 500: stack trace".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error.code, "UPSTREAM_ERROR");
        // Raw upstream text must not leak to callers.
        assert!(
            !body.error.message.contains("stack trace"),
            "upstream details must not leak: {}",
            body.error.message
        );
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("connection pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[test]
    fn crm_authorization_failure_maps_to_unauthorized() {
        let crm_err = mgw_crm_client::CrmError::ApiError {
            endpoint: "GET /contacts".into(),
            status: 401,
            body: "token expired".into(),
        };
        let app_err = AppError::from(crm_err);
        let (status, _) = app_err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn crm_server_error_maps_to_upstream() {
        let crm_err = mgw_crm_client::CrmError::ApiError {
            endpoint: "GET /contacts".into(),
            status: 500,
            body: "boom".into(),
        };
        let app_err = AppError::from(crm_err);
        let (status, _) = app_err.status_and_code();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
