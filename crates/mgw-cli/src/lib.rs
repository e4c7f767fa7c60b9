//! # mgw-cli — Operator tooling for the Membership Gateway
//!
//! Subcommand handlers for the `mgw` binary:
//! - [`contact`] — look up a CRM contact by email or master customer ID
//! - [`optionset`] — resolve an option-set label to its integer value
//! - [`payload`] — validate a request payload file offline
//!
//! Each handler returns the process exit code (0 success, 1 failure),
//! with errors reported through `anyhow` context chains.

pub mod contact;
pub mod optionset;
pub mod payload;

use mgw_crm_client::{CrmClient, CrmConfig};

/// Build a CRM client from the environment (`CRM_BASE_URL`,
/// `CRM_API_TOKEN`).
pub(crate) fn crm_client() -> anyhow::Result<CrmClient> {
    let config = CrmConfig::from_env()?;
    Ok(CrmClient::new(config)?)
}

/// Build a single-threaded Tokio runtime for one command.
pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
