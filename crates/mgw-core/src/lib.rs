#![deny(missing_docs)]

//! # mgw-core — Foundational Types for the Membership Gateway
//!
//! This crate defines the domain primitives that every other crate in the
//! workspace depends on. It has no internal crate dependencies — only `serde`,
//! `thiserror`, `chrono`, and `base64` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type, validated at construction. You cannot pass a raw string
//!    where a [`MasterCustomerId`] is expected, and a constructed [`Phone`]
//!    is always in canonical form.
//!
//! 2. **Business rules live here, not in handlers.** Group capacities,
//!    the activation validity window, and the activation status machine are
//!    defined once and matched exhaustively. The HTTP layer only maps their
//!    outcomes to response remarks.
//!
//! 3. **Structured errors with `thiserror`.** No `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod membership;
pub mod normalize;

// Re-export primary types at crate root for ergonomic imports.
pub use error::ValidationError;
pub use identity::{ActivationCode, CardSerial, Email, MasterCustomerId, Phone};
pub use membership::{
    check_group_capacity, try_activate, ActivationError, ActivationStatus, GroupError, GroupType,
    MemberRole, ACTIVATION_VALIDITY_DAYS,
};
pub use normalize::{looks_like_base64, normalize_phone};
