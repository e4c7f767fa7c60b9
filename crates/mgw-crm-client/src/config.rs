//! CRM client configuration.
//!
//! Configures the Dataverse organization URL and credentials. Override via
//! environment variables or explicit construction for staging/testing.

use url::Url;
use zeroize::Zeroizing;

/// Configuration for connecting to the Dataverse Web API.
///
/// Custom `Debug` implementation redacts the `api_token` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct CrmConfig {
    /// Organization base URL, e.g. `https://wkcda.crm5.dynamics.com`.
    pub base_url: Url,
    /// Bearer token for Web API authentication.
    pub api_token: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for CrmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CrmConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CRM_BASE_URL` (required) — the organization URL
    /// - `CRM_API_TOKEN` (required)
    /// - `CRM_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_url = std::env::var("CRM_BASE_URL").map_err(|_| ConfigError::MissingBaseUrl)?;
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidUrl("CRM_BASE_URL".to_string(), e.to_string()))?;
        let api_token = std::env::var("CRM_API_TOKEN")
            .map(Zeroizing::new)
            .map_err(|_| ConfigError::MissingToken)?;

        Ok(Self {
            base_url,
            api_token,
            timeout_secs: std::env::var("CRM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        })
    }

    /// Create a configuration pointing at a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if the localhost URL cannot be
    /// parsed (should not occur for valid port numbers, but avoids
    /// `expect()`).
    pub fn local_mock(port: u16, token: &str) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&format!("http://127.0.0.1:{port}"))
            .map_err(|e| ConfigError::InvalidUrl("localhost".to_string(), e.to_string()))?;
        Ok(Self {
            base_url,
            api_token: Zeroizing::new(token.to_string()),
            timeout_secs: 5,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CRM_BASE_URL environment variable is required")]
    MissingBaseUrl,
    #[error("CRM_API_TOKEN environment variable is required")]
    MissingToken,
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = CrmConfig::local_mock(9000, "test-token").unwrap();
        assert_eq!(cfg.api_token.as_str(), "test-token");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = CrmConfig::local_mock(9000, "super-secret").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));
    }
}
