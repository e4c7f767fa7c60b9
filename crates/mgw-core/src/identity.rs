//! # Identity Newtypes
//!
//! Domain-primitive newtypes for the customer-facing identifiers that flow
//! through every endpoint. Each identifier is a distinct type — you cannot
//! pass an [`ActivationCode`] where a [`CardSerial`] is expected.
//!
//! ## Validation
//!
//! All constructors validate at construction time and store a canonical
//! form: emails are lowercased, phones are stripped to digits (with an
//! optional leading `+`), activation codes and card serials are uppercased.
//! A value that exists is a value that passed validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::normalize::normalize_phone;

/// A human-readable customer identifier stored on the CRM contact record.
///
/// Format: `P` followed by 11–17 decimal digits. Generated identifiers use
/// the Unix epoch in milliseconds (`P<millis>`), which keeps them sortable
/// by creation time while staying opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MasterCustomerId(String);

impl MasterCustomerId {
    /// Parse a master customer ID, validating the `P<digits>` format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMasterCustomerId`] when the value
    /// does not start with `P` or the digit run is outside 11–17 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        let Some(digits) = trimmed.strip_prefix('P') else {
            return Err(ValidationError::InvalidMasterCustomerId(s));
        };
        if digits.len() < 11 || digits.len() > 17 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidMasterCustomerId(s));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Generate a fresh master customer ID from a creation instant.
    ///
    /// The instant is taken as a parameter rather than read from the clock
    /// so that callers control time in tests.
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self(format!("P{}", now.timestamp_millis()))
    }

    /// Access the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MasterCustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An email address in canonical (lowercase) form.
///
/// # Validation
///
/// - Exactly one `@`
/// - Non-empty local part without whitespace
/// - Domain containing at least one `.`, with non-empty labels around it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parse an email address, validating structure and lowercasing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEmail`] on structural failure.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let lowered = raw.trim().to_lowercase();

        let mut parts = lowered.splitn(2, '@');
        let local = parts.next().unwrap_or_default();
        let domain = match parts.next() {
            Some(d) => d,
            None => return Err(ValidationError::InvalidEmail(raw)),
        };

        if local.is_empty() || local.chars().any(|c| c.is_whitespace()) || domain.contains('@') {
            return Err(ValidationError::InvalidEmail(raw));
        }
        let dot = match domain.find('.') {
            Some(p) => p,
            None => return Err(ValidationError::InvalidEmail(raw)),
        };
        if dot == 0 || dot == domain.len() - 1 || domain.chars().any(|c| c.is_whitespace()) {
            return Err(ValidationError::InvalidEmail(raw));
        }

        Ok(Self(lowered))
    }

    /// Access the canonical (lowercase) email string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A phone number in canonical form: optional leading `+`, then 7–15 digits.
///
/// The constructor accepts common formatted inputs (`"+852 9123-4567"`,
/// `"(852) 91234567"`) and strips spaces, dashes, and parentheses. See
/// [`normalize_phone`] for the exact rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phone(String);

impl Phone {
    /// Parse a phone number, normalizing to canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPhone`] when the normalized value
    /// has the wrong length or contains non-digit characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        match normalize_phone(&raw) {
            Some(canonical) => Ok(Self(canonical)),
            None => Err(ValidationError::InvalidPhone(raw)),
        }
    }

    /// Access the canonical phone string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Phone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An activation code for a prepaid or gifted membership.
///
/// 8–20 alphanumeric characters, stored uppercase. Codes are issued by the
/// CRM; the gateway only ever looks them up, so validation is purely
/// structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationCode(String);

impl ActivationCode {
    /// Parse an activation code, validating shape and uppercasing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidActivationCode`] on failure.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let upper = raw.trim().to_uppercase();
        if upper.len() < 8 || upper.len() > 20 || !upper.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidActivationCode(raw));
        }
        Ok(Self(upper))
    }

    /// Access the canonical (uppercase) code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActivationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A physical membership card serial number.
///
/// 6–20 alphanumeric characters, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardSerial(String);

impl CardSerial {
    /// Parse a card serial number, validating shape and uppercasing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCardSerial`] on failure.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let upper = raw.trim().to_uppercase();
        if upper.len() < 6 || upper.len() > 20 || !upper.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::InvalidCardSerial(raw));
        }
        Ok(Self(upper))
    }

    /// Access the canonical (uppercase) serial.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // -- MasterCustomerId --

    #[test]
    fn master_customer_id_valid() {
        let id = MasterCustomerId::new("P17234567890123").unwrap();
        assert_eq!(id.as_str(), "P17234567890123");
    }

    #[test]
    fn master_customer_id_generate_roundtrips() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let id = MasterCustomerId::generate(now);
        assert!(id.as_str().starts_with('P'));
        // Generated IDs must themselves parse.
        assert_eq!(MasterCustomerId::new(id.as_str()).unwrap(), id);
    }

    #[test]
    fn master_customer_id_rejects_invalid() {
        assert!(MasterCustomerId::new("").is_err());
        assert!(MasterCustomerId::new("17234567890123").is_err()); // no prefix
        assert!(MasterCustomerId::new("P123").is_err()); // too short
        assert!(MasterCustomerId::new("P123456789012345678").is_err()); // too long
        assert!(MasterCustomerId::new("P1723456789012a").is_err()); // non-digit
        assert!(MasterCustomerId::new("Q17234567890123").is_err()); // wrong prefix
    }

    // -- Email --

    #[test]
    fn email_valid_and_lowercased() {
        let email = Email::new("Alice.Lee@Example.COM").unwrap();
        assert_eq!(email.as_str(), "alice.lee@example.com");
    }

    #[test]
    fn email_trims_whitespace() {
        let email = Email::new("  bob@example.org  ").unwrap();
        assert_eq!(email.as_str(), "bob@example.org");
    }

    #[test]
    fn email_rejects_invalid() {
        assert!(Email::new("").is_err());
        assert!(Email::new("plainstring").is_err());
        assert!(Email::new("@example.com").is_err()); // empty local
        assert!(Email::new("a@b").is_err()); // no dot in domain
        assert!(Email::new("a@.com").is_err()); // dot-leading domain
        assert!(Email::new("a@com.").is_err()); // dot-trailing domain
        assert!(Email::new("a b@example.com").is_err()); // whitespace
        assert!(Email::new("a@b@example.com").is_err()); // double @
    }

    // -- Phone --

    #[test]
    fn phone_normalizes_formatting() {
        let phone = Phone::new("+852 9123-4567").unwrap();
        assert_eq!(phone.as_str(), "+85291234567");
    }

    #[test]
    fn phone_accepts_parentheses() {
        let phone = Phone::new("(852) 91234567").unwrap();
        assert_eq!(phone.as_str(), "85291234567");
    }

    #[test]
    fn phone_rejects_invalid() {
        assert!(Phone::new("").is_err());
        assert!(Phone::new("123").is_err()); // too short
        assert!(Phone::new("1234567890123456").is_err()); // too long
        assert!(Phone::new("9123-456x").is_err()); // letters
    }

    // -- ActivationCode --

    #[test]
    fn activation_code_uppercased() {
        let code = ActivationCode::new("abcd1234efgh").unwrap();
        assert_eq!(code.as_str(), "ABCD1234EFGH");
    }

    #[test]
    fn activation_code_rejects_invalid() {
        assert!(ActivationCode::new("").is_err());
        assert!(ActivationCode::new("SHORT").is_err()); // 5 chars
        assert!(ActivationCode::new("HAS-DASHES-IN").is_err());
        assert!(ActivationCode::new("X".repeat(21)).is_err());
    }

    // -- CardSerial --

    #[test]
    fn card_serial_uppercased() {
        let serial = CardSerial::new("wk00123456").unwrap();
        assert_eq!(serial.as_str(), "WK00123456");
    }

    #[test]
    fn card_serial_rejects_invalid() {
        assert!(CardSerial::new("").is_err());
        assert!(CardSerial::new("AB12").is_err()); // too short
        assert!(CardSerial::new("WK 123456").is_err()); // inner space
    }

    // -- Serde transparency --

    #[test]
    fn identifiers_serialize_as_plain_strings() {
        let id = MasterCustomerId::new("P17234567890123").unwrap();
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"P17234567890123\""
        );
        let email = Email::new("a@example.com").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"a@example.com\"");
    }
}
