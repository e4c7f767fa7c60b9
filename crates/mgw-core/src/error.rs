//! # Error Hierarchy
//!
//! Structured error types for the Membership Gateway domain layer, built
//! with `thiserror`. Each variant carries the offending input so that
//! callers can produce an actionable remark without re-deriving context.

use thiserror::Error;

/// Domain primitive validation failure.
///
/// Raised by the constructors in [`crate::identity`]. The contained string
/// is the rejected input (secrets never pass through these types, so echoing
/// the value back in remarks is safe).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Master customer ID did not match the `P<digits>` format.
    #[error("invalid master customer ID: {0}")]
    InvalidMasterCustomerId(String),

    /// Email address failed structural validation.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// Phone number failed normalization (wrong length or characters).
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    /// Activation code failed structural validation.
    #[error("invalid activation code: {0}")]
    InvalidActivationCode(String),

    /// Physical card serial number failed structural validation.
    #[error("invalid card serial number: {0}")]
    InvalidCardSerial(String),
}
