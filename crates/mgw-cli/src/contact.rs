//! `mgw contact` — look up a CRM contact.

use anyhow::Context;
use clap::Args;

/// Arguments for the `contact` subcommand.
#[derive(Args, Debug)]
pub struct ContactArgs {
    /// Look up by email address.
    #[arg(long, conflicts_with = "master_customer_id")]
    pub email: Option<String>,

    /// Look up by master customer ID.
    #[arg(long)]
    pub master_customer_id: Option<String>,
}

/// Run the contact lookup. Prints a profile summary; phone and email are
/// printed as stored (operators are inside the data boundary).
pub fn run_contact(args: &ContactArgs) -> anyhow::Result<u8> {
    let crm = crate::crm_client().context("building CRM client")?;
    let runtime = crate::runtime()?;

    let lookup = if let Some(mcid) = &args.master_customer_id {
        runtime.block_on(crm.contacts().find_by_master_customer_id(mcid))
    } else if let Some(email) = &args.email {
        let email = email.trim().to_lowercase();
        runtime.block_on(crm.contacts().find_by_email(&email))
    } else {
        anyhow::bail!("either --email or --master-customer-id is required");
    };
    let contact = lookup.context("CRM lookup failed")?;

    match contact {
        Some(contact) => {
            println!("ContactID:        {}", contact.id);
            println!(
                "MasterCustomerID: {}",
                contact.master_customer_id.as_deref().unwrap_or("-")
            );
            println!("Email:            {}", contact.email.as_deref().unwrap_or("-"));
            println!(
                "Name:             {} {}",
                contact.first_name.as_deref().unwrap_or(""),
                contact.last_name.as_deref().unwrap_or("")
            );
            println!("Phone:            {}", contact.phone.as_deref().unwrap_or("-"));
            Ok(0)
        }
        None => {
            println!("No contact found");
            Ok(1)
        }
    }
}
