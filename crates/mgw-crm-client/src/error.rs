//! Error types for CRM Web API calls.
//!
//! Every failure carries the logical endpoint that was being called, so
//! operator logs identify the failing operation without request tracing.

use thiserror::Error;

/// Errors returned by the CRM client.
#[derive(Error, Debug)]
pub enum CrmError {
    /// Client configuration problem (missing token, bad URL).
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        /// Logical endpoint, e.g. `POST /contacts`.
        endpoint: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The CRM answered with a non-success status.
    #[error("CRM returned {status} for {endpoint}: {body}")]
    ApiError {
        /// Logical endpoint.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body (logged, never forwarded to callers).
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        /// Logical endpoint.
        endpoint: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// A request body could not be serialized.
    #[error("failed to serialize request for {endpoint}: {source}")]
    Serialization {
        /// Logical endpoint.
        endpoint: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },
}

impl CrmError {
    /// Whether this error is a credential rejection by the CRM.
    ///
    /// Status-code based (401/403), replacing exception-message substring
    /// matching. Callers map this to their own 401.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(
            self,
            Self::ApiError {
                status: 401 | 403,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_failure_detection() {
        let unauthorized = CrmError::ApiError {
            endpoint: "GET /contacts".into(),
            status: 401,
            body: String::new(),
        };
        let forbidden = CrmError::ApiError {
            endpoint: "GET /contacts".into(),
            status: 403,
            body: String::new(),
        };
        let server_error = CrmError::ApiError {
            endpoint: "GET /contacts".into(),
            status: 500,
            body: String::new(),
        };
        assert!(unauthorized.is_authorization_failure());
        assert!(forbidden.is_authorization_failure());
        assert!(!server_error.is_authorization_failure());
    }

    #[test]
    fn api_error_display_carries_context() {
        let err = CrmError::ApiError {
            endpoint: "POST /contacts".into(),
            status: 400,
            body: "bad payload".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("POST /contacts"));
        assert!(rendered.contains("400"));
    }
}
