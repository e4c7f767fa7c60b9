//! `mgw option-set` — resolve an option-set label against the live CRM.

use anyhow::Context;
use clap::Args;

/// Arguments for the `option-set` subcommand.
#[derive(Args, Debug)]
pub struct OptionSetArgs {
    /// Entity logical name (e.g. `contact`).
    #[arg(long)]
    pub entity: String,

    /// Attribute logical name (e.g. `gendercode`).
    #[arg(long)]
    pub attribute: String,

    /// Display label to resolve (e.g. `Female`).
    #[arg(long)]
    pub label: String,
}

/// Run the option-set resolution.
pub fn run_optionset(args: &OptionSetArgs) -> anyhow::Result<u8> {
    let crm = crate::crm_client().context("building CRM client")?;
    let runtime = crate::runtime()?;

    let value = runtime
        .block_on(crm.metadata().option_value(&args.entity, &args.attribute, &args.label))
        .context("metadata lookup failed")?;

    match value {
        Some(value) => {
            println!("{}.{} '{}' = {value}", args.entity, args.attribute, args.label);
            Ok(0)
        }
        None => {
            println!(
                "{}.{} has no option labeled '{}'",
                args.entity, args.attribute, args.label
            );
            Ok(1)
        }
    }
}
