//! `mgw payload` — validate a request payload file offline.
//!
//! Parses the file against the endpoint's request DTO and runs the same
//! business-rule validation the gateway applies, without touching the
//! CRM. Used to check portal exports before replaying them.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use mgw_api::extractors::Validate;
use mgw_api::routes::{activation, consents, customers, donations, events, groups, membership};

/// Arguments for the `payload` subcommand.
#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Endpoint name, e.g. `CreateCustomerWS`.
    #[arg(long)]
    pub endpoint: String,

    /// Path to the JSON payload file.
    #[arg(long)]
    pub file: PathBuf,
}

/// Parse the payload as `T` and run its validation.
fn check<T>(raw: &str) -> Result<(), String>
where
    T: serde::de::DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_str(raw).map_err(|e| format!("Invalid JSON: {e}"))?;
    parsed.validate()
}

/// Run the payload validation.
pub fn run_payload(args: &PayloadArgs) -> anyhow::Result<u8> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let outcome = match args.endpoint.as_str() {
        "CreateCustomerWS" => check::<customers::CreateCustomerRequest>(&raw),
        "UpdateCustomerWS" => check::<customers::UpdateCustomerRequest>(&raw),
        "GetCustomerDetailWS" => check::<customers::GetCustomerDetailRequest>(&raw),
        "UpdateCustomerSubscriptionWS" => check::<consents::UpdateSubscriptionRequest>(&raw),
        "UpdateCustomerPICSWS" => check::<consents::UpdatePicsRequest>(&raw),
        "ActivationCodeValidation" => check::<activation::ActivationCodeValidationRequest>(&raw),
        "MembershipActivationWS" => check::<activation::MembershipActivationRequest>(&raw),
        "PaidMembershipPurchaseBeforePayment" => {
            check::<membership::PurchaseBeforePaymentRequest>(&raw)
        }
        "PaidMembershipPurchaseAfterPayment" => {
            check::<membership::PurchaseAfterPaymentRequest>(&raw)
        }
        "MembershipUpgradeWS" => check::<membership::MembershipUpgradeRequest>(&raw),
        "MembershipRenewalWS" => check::<membership::MembershipRenewalRequest>(&raw),
        "AddMembershipGroupMemberWS" => check::<groups::AddGroupMemberRequest>(&raw),
        "CreateOnlineDonationTransactionWS" => check::<donations::CreateDonationRequest>(&raw),
        "CreateEventTransactionWS" => check::<events::CreateEventTransactionRequest>(&raw),
        "UpdateEventAttendanceWS" => check::<events::UpdateAttendanceRequest>(&raw),
        other => anyhow::bail!("unknown endpoint '{other}'"),
    };

    match outcome {
        Ok(()) => {
            println!("{}: payload is valid", args.endpoint);
            Ok(0)
        }
        Err(remark) => {
            println!("{}: {remark}", args.endpoint);
            Ok(1)
        }
    }
}
