//! # Request Extraction & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and the JSON
//! extraction helper used by every handler.
//!
//! Malformed JSON is a business-level outcome under the gateway's response
//! contract: the endpoint answers 200 with a `success:false` envelope and
//! the remark `"Invalid JSON"`. Extraction therefore yields a remark
//! string, not an HTTP error.

use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Remark returned for request bodies that fail to parse.
pub const INVALID_JSON_REMARK: &str = "Invalid JSON";

/// Trait for request types that validate business rules beyond what serde
/// deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns the rejection remark on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization failures to the
/// `"Invalid JSON"` remark.
///
/// Handlers use:
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = match extract_json(body) {
///         Ok(req) => req,
///         Err(remark) => return Ok(Json(Response::rejected(remark))),
///     };
///     // use req...
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, String> {
    match result {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(detail = %rejection.body_text(), "request body rejected");
            Err(INVALID_JSON_REMARK.to_string())
        }
    }
}
