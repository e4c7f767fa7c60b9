//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## What is NOT here
//!
//! No stores. The gateway is stateless between requests: contacts,
//! memberships, and transactions live in the CRM and are accessed through
//! `mgw-crm-client`. The only process-wide objects are the CRM client's
//! connection pool and the option-set metadata cache inside it.

use mgw_crm_client::CrmClient;

/// Application configuration.
///
/// Custom `Debug` redacts the `auth_token` to prevent credential leakage
/// in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer token callers must present.
    /// If `None`, authentication is disabled (development mode).
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly: the CRM client shares its HTTP pool and metadata cache
/// across clones.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Typed CRM client. `None` when the gateway starts without CRM
    /// credentials — endpoints then answer 503.
    pub crm: Option<CrmClient>,
    /// Application configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with default configuration and no
    /// CRM client.
    pub fn new() -> Self {
        Self {
            crm: None,
            config: AppConfig::default(),
        }
    }

    /// Create a new application state with the given configuration and
    /// optional CRM client.
    pub fn with_config(config: AppConfig, crm: Option<CrmClient>) -> Self {
        Self { crm, config }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_new_has_no_crm_client() {
        let state = AppState::new();
        assert!(state.crm.is_none());
        assert_eq!(state.config.port, 8080);
        assert!(state.config.auth_token.is_none());
    }

    #[test]
    fn app_state_with_config_applies_custom_config() {
        let config = AppConfig {
            port: 3000,
            auth_token: Some("secret-token".to_string()),
        };
        let state = AppState::with_config(config, None);
        assert_eq!(state.config.port, 3000);
        assert_eq!(state.config.auth_token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            port: 8080,
            auth_token: Some("super-secret".to_string()),
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super-secret"));
    }
}
