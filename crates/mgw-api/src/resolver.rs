//! # Contact Resolution
//!
//! One resolver for every endpoint that needs to find or create the
//! contact behind an email address. Matching behavior is explicit at the
//! call site via [`MatchStrategy`], so endpoints no longer carry their own
//! slightly-different lookup code.

use chrono::Utc;
use mgw_core::MasterCustomerId;
use mgw_crm_client::contacts::{ContactClient, CrmContact, NewContact};
use mgw_crm_client::CrmError;

/// How a contact is matched against existing CRM records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Match on email equality only.
    ExactEmail,
    /// Match on email equality, then fall back to an email-or-phone
    /// OR-filter when a phone number is available.
    EmailThenPhone,
}

/// Outcome of [`ContactResolver::resolve_or_create`].
#[derive(Debug, Clone)]
pub struct ResolvedContact {
    /// The matched or newly created contact.
    pub contact: CrmContact,
    /// Whether the contact was created by this call.
    pub created: bool,
}

/// Strategy-driven contact lookup and creation.
///
/// First match wins. The lookup and any subsequent create are separate
/// CRM calls with no cross-request lock, so two concurrent requests for
/// the same new email can both create a contact — the same behavior the
/// portal integration has always had.
#[derive(Debug, Clone, Copy)]
pub struct ContactResolver<'a> {
    contacts: &'a ContactClient,
}

impl<'a> ContactResolver<'a> {
    /// Create a resolver over the given contact client.
    pub fn new(contacts: &'a ContactClient) -> Self {
        Self { contacts }
    }

    /// Find an existing contact using the given strategy.
    pub async fn resolve(
        &self,
        email: &str,
        phone: Option<&str>,
        strategy: MatchStrategy,
    ) -> Result<Option<CrmContact>, CrmError> {
        if let Some(found) = self.contacts.find_by_email(email).await? {
            return Ok(Some(found));
        }

        match (strategy, phone) {
            (MatchStrategy::EmailThenPhone, Some(phone)) => {
                self.contacts.find_by_email_or_phone(email, phone).await
            }
            _ => Ok(None),
        }
    }

    /// Find an existing contact, or create one with a generated
    /// master customer ID.
    pub async fn resolve_or_create(
        &self,
        template: ContactTemplate<'_>,
        strategy: MatchStrategy,
    ) -> Result<ResolvedContact, CrmError> {
        if let Some(contact) = self.resolve(template.email, template.phone, strategy).await? {
            return Ok(ResolvedContact {
                contact,
                created: false,
            });
        }

        let master_customer_id = MasterCustomerId::generate(Utc::now());
        let req = NewContact {
            email: template.email.to_string(),
            first_name: template.first_name.unwrap_or_default().to_string(),
            last_name: template.last_name.unwrap_or_default().to_string(),
            master_customer_id: master_customer_id.as_str().to_string(),
            phone: template.phone.map(str::to_string),
            birth_date: None,
            gender_value: None,
            preferred_language_value: None,
            customer_source_value: template.customer_source_value,
            e_marketing_consent: None,
            pics_consent: None,
            photo_url: None,
            photo_data: None,
        };
        let contact = self.contacts.create(&req).await?;
        tracing::info!(
            master_customer_id = %master_customer_id,
            "created contact for unmatched email"
        );
        Ok(ResolvedContact {
            contact,
            created: true,
        })
    }
}

/// Minimal contact fields used when resolution has to create a record.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactTemplate<'a> {
    pub email: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub phone: Option<&'a str>,
    /// Customer source option-set value, when the caller's channel is known.
    pub customer_source_value: Option<i32>,
}
