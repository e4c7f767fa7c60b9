//! # mgw-crm-client — Typed Rust client for the Dataverse Web API
//!
//! Provides ergonomic, typed access to the CRM tables the Membership
//! Gateway reads and writes:
//! - **Contacts** (`contacts`)
//! - **Memberships** (`wkcda_membershiptiers`, `wkcda_membershiptierhistories`,
//!   `wkcda_membershipactivations`, `wkcda_membershipgroups`,
//!   `wkcda_membershipgrouprelationships`)
//! - **Transactions** (`wkcda_paymenttransactions`, `wkcda_gifttransactions`,
//!   `wkcda_eventtransactions`, `wkcda_attendances`)
//! - **Metadata** (option-set label resolution via `EntityDefinitions`)
//!
//! ## Architecture
//!
//! This crate is the only path from the gateway to the CRM. Route handlers
//! never build Dataverse URLs or OData filters themselves.
//!
//! ## API Path Convention
//!
//! All requests go through the Dataverse Web API under the organization
//! URL: `{base_url}/api/data/v9.2/{entity-set}`. Point reads use
//! `{entity-set}({guid})`; option-set metadata is read from
//! `EntityDefinitions(LogicalName='…')/Attributes(LogicalName='…')`.

pub mod config;
pub mod contacts;
pub mod error;
pub mod memberships;
pub mod metadata;
pub(crate) mod retry;
pub mod transactions;
pub mod types;

pub use config::CrmConfig;
pub use error::CrmError;

/// API version path segment shared by every request.
pub(crate) const API_PREFIX: &str = "api/data/v9.2";

/// Top-level CRM client. Holds sub-clients for each table group.
#[derive(Debug, Clone)]
pub struct CrmClient {
    contacts: contacts::ContactClient,
    memberships: memberships::MembershipClient,
    transactions: transactions::TransactionClient,
    metadata: metadata::MetadataClient,
}

impl CrmClient {
    /// Create a new CRM client from configuration.
    ///
    /// Builds one `reqwest::Client` with the bearer token and OData headers
    /// installed, shared by all sub-clients.
    pub fn new(config: CrmConfig) -> Result<Self, CrmError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", config.api_token.as_str()))
                .map_err(|_| CrmError::Config(config::ConfigError::MissingToken))?,
        );
        headers.insert(
            "OData-MaxVersion",
            reqwest::header::HeaderValue::from_static("4.0"),
        );
        headers.insert(
            "OData-Version",
            reqwest::header::HeaderValue::from_static("4.0"),
        );

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CrmError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        Ok(Self {
            contacts: contacts::ContactClient::new(http.clone(), config.base_url.clone()),
            memberships: memberships::MembershipClient::new(http.clone(), config.base_url.clone()),
            transactions: transactions::TransactionClient::new(
                http.clone(),
                config.base_url.clone(),
            ),
            metadata: metadata::MetadataClient::new(http, config.base_url),
        })
    }

    /// Access the contacts client.
    pub fn contacts(&self) -> &contacts::ContactClient {
        &self.contacts
    }

    /// Access the membership tables client.
    pub fn memberships(&self) -> &memberships::MembershipClient {
        &self.memberships
    }

    /// Access the transaction tables client.
    pub fn transactions(&self) -> &transactions::TransactionClient {
        &self.transactions
    }

    /// Access the option-set metadata client.
    pub fn metadata(&self) -> &metadata::MetadataClient {
        &self.metadata
    }
}
