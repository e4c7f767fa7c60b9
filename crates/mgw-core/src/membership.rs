//! # Membership Rules & Activation Lifecycle
//!
//! Group cardinality policy and the activation-code status machine. These
//! are the only pieces of multi-step business logic in the gateway; every
//! endpoint that touches groups or activation codes delegates here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Days an issued activation code remains redeemable.
pub const ACTIVATION_VALIDITY_DAYS: i64 = 90;

// ── Group membership ────────────────────────────────────────────────────────

/// Membership group type, each with a fixed member capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum GroupType {
    /// Single-member membership.
    Individual,
    /// Two-member membership.
    Dual,
    /// Household membership, up to seven members.
    Family,
}

impl GroupType {
    /// Parse a caller-supplied group type label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "dual" => Some(Self::Dual),
            "family" => Some(Self::Family),
            _ => None,
        }
    }

    /// The CRM display label for this group type.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Individual => "Individual",
            Self::Dual => "Dual",
            Self::Family => "Family",
        }
    }

    /// Maximum number of members (primary included) the group may hold.
    pub fn member_capacity(&self) -> usize {
        match self {
            Self::Individual => 1,
            Self::Dual => 2,
            Self::Family => 7,
        }
    }
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Role of a contact within a membership group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemberRole {
    /// The purchasing member. Exactly one per group.
    Primary,
    /// An additional member attached to the primary's purchase.
    AddOn,
}

impl MemberRole {
    /// Parse a caller-supplied role label, case-insensitively.
    ///
    /// Accepts the portal's spaced spelling (`"Primary Member"`,
    /// `"Add-on Member"`) alongside the bare labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "primary" | "primary member" => Some(Self::Primary),
            "addon" | "add-on" | "add-on member" => Some(Self::AddOn),
            _ => None,
        }
    }

    /// The CRM display label for this role.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Primary => "Primary",
            Self::AddOn => "Add-on",
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Group cardinality violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// The insert would push the group past its capacity.
    #[error("{group_type} membership allows at most {capacity} members")]
    CapacityExceeded {
        /// The group's type.
        group_type: GroupType,
        /// The capacity that would be exceeded.
        capacity: usize,
    },

    /// A group must contain exactly one primary member.
    #[error("a membership group requires exactly one primary member, got {0}")]
    PrimaryCountInvalid(usize),
}

/// Check that inserting one more member keeps the group within capacity.
///
/// `current_count` is the number of members already recorded. The caller
/// performs the read and the subsequent insert as separate CRM calls; the
/// sequence is not atomic against concurrent requests.
pub fn check_group_capacity(group_type: GroupType, current_count: usize) -> Result<(), GroupError> {
    let capacity = group_type.member_capacity();
    if current_count >= capacity {
        return Err(GroupError::CapacityExceeded {
            group_type,
            capacity,
        });
    }
    Ok(())
}

// ── Activation lifecycle ────────────────────────────────────────────────────

/// Status of a membership activation code.
///
/// `New` and `Activated` are persisted in the CRM. `Expired` is never
/// written: it is derived at read time from the issue date via
/// [`ActivationStatus::effective`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationStatus {
    /// Issued, not yet redeemed.
    New,
    /// Redeemed by a contact. Terminal.
    Activated,
    /// Past the validity window without redemption. Derived, never stored.
    Expired,
}

impl ActivationStatus {
    /// Parse a CRM status label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "New" => Some(Self::New),
            "Activated" => Some(Self::Activated),
            "Expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// The CRM display label for this status.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Activated => "Activated",
            Self::Expired => "Expired",
        }
    }

    /// Compute the effective status at `now`.
    ///
    /// A `New` code whose issue date lies more than
    /// [`ACTIVATION_VALIDITY_DAYS`] in the past reads as `Expired`.
    pub fn effective(self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        match self {
            Self::New if now > issued_at + Duration::days(ACTIVATION_VALIDITY_DAYS) => {
                Self::Expired
            }
            other => other,
        }
    }
}

impl std::fmt::Display for ActivationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Reasons an activation attempt is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    /// The code was already redeemed.
    #[error("this code has already been activated")]
    AlreadyActivated,

    /// The code's validity window has lapsed.
    #[error("this code has expired")]
    Expired,
}

/// Attempt the `New → Activated` transition.
///
/// Returns the new status on success. The expiry check uses the same
/// derived-status rule as [`ActivationStatus::effective`], so a stale `New`
/// row can never be redeemed past its window.
pub fn try_activate(
    status: ActivationStatus,
    issued_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<ActivationStatus, ActivationError> {
    match status.effective(issued_at, now) {
        ActivationStatus::New => Ok(ActivationStatus::Activated),
        ActivationStatus::Activated => Err(ActivationError::AlreadyActivated),
        ActivationStatus::Expired => Err(ActivationError::Expired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, d, 12, 0, 0).unwrap()
    }

    // -- GroupType --

    #[test]
    fn group_type_labels_roundtrip() {
        for gt in [GroupType::Individual, GroupType::Dual, GroupType::Family] {
            assert_eq!(GroupType::from_label(gt.as_label()), Some(gt));
        }
        assert_eq!(GroupType::from_label("FAMILY"), Some(GroupType::Family));
        assert_eq!(GroupType::from_label("corporate"), None);
    }

    #[test]
    fn group_capacities() {
        assert_eq!(GroupType::Individual.member_capacity(), 1);
        assert_eq!(GroupType::Dual.member_capacity(), 2);
        assert_eq!(GroupType::Family.member_capacity(), 7);
    }

    #[test]
    fn capacity_check_allows_below_cap() {
        assert!(check_group_capacity(GroupType::Family, 6).is_ok());
        assert!(check_group_capacity(GroupType::Dual, 1).is_ok());
        assert!(check_group_capacity(GroupType::Individual, 0).is_ok());
    }

    #[test]
    fn capacity_check_rejects_at_cap() {
        let err = check_group_capacity(GroupType::Family, 7).unwrap_err();
        assert_eq!(
            err,
            GroupError::CapacityExceeded {
                group_type: GroupType::Family,
                capacity: 7
            }
        );
        assert!(check_group_capacity(GroupType::Individual, 1).is_err());
    }

    // -- MemberRole --

    #[test]
    fn member_role_accepts_portal_spellings() {
        assert_eq!(MemberRole::from_label("Primary Member"), Some(MemberRole::Primary));
        assert_eq!(MemberRole::from_label("Add-on Member"), Some(MemberRole::AddOn));
        assert_eq!(MemberRole::from_label("addon"), Some(MemberRole::AddOn));
        assert_eq!(MemberRole::from_label("guest"), None);
    }

    // -- ActivationStatus --

    #[test]
    fn new_code_within_window_stays_new() {
        let status = ActivationStatus::New.effective(day(1), day(1) + Duration::days(89));
        assert_eq!(status, ActivationStatus::New);
    }

    #[test]
    fn new_code_past_window_reads_expired() {
        let status = ActivationStatus::New.effective(day(1), day(1) + Duration::days(91));
        assert_eq!(status, ActivationStatus::Expired);
    }

    #[test]
    fn activated_code_never_expires() {
        let status = ActivationStatus::Activated.effective(day(1), day(1) + Duration::days(400));
        assert_eq!(status, ActivationStatus::Activated);
    }

    #[test]
    fn activate_new_code_succeeds() {
        let next = try_activate(ActivationStatus::New, day(1), day(2)).unwrap();
        assert_eq!(next, ActivationStatus::Activated);
    }

    #[test]
    fn activate_redeemed_code_fails() {
        let err = try_activate(ActivationStatus::Activated, day(1), day(2)).unwrap_err();
        assert_eq!(err, ActivationError::AlreadyActivated);
    }

    #[test]
    fn activate_expired_code_fails() {
        let err =
            try_activate(ActivationStatus::New, day(1), day(1) + Duration::days(91)).unwrap_err();
        assert_eq!(err, ActivationError::Expired);
    }

    #[test]
    fn window_boundary_is_inclusive() {
        // Exactly 90 days after issue is still redeemable.
        let at_boundary = day(1) + Duration::days(ACTIVATION_VALIDITY_DAYS);
        assert!(try_activate(ActivationStatus::New, day(1), at_boundary).is_ok());
    }

    #[test]
    fn status_labels_roundtrip() {
        for s in [
            ActivationStatus::New,
            ActivationStatus::Activated,
            ActivationStatus::Expired,
        ] {
            assert_eq!(ActivationStatus::from_label(s.as_label()), Some(s));
        }
        assert_eq!(ActivationStatus::from_label("Issued"), None);
    }
}
