//! Canonical worker status and normalization of backend status text.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Closed set of worker statuses shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerStatus {
    Active,
    Inactive,
    Pending,
    Rejected,
}

impl WorkerStatus {
    pub const ALL: [WorkerStatus; 4] = [
        WorkerStatus::Active,
        WorkerStatus::Inactive,
        WorkerStatus::Pending,
        WorkerStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Active => "Active",
            WorkerStatus::Inactive => "Inactive",
            WorkerStatus::Pending => "Pending",
            WorkerStatus::Rejected => "Rejected",
        }
    }

    /// Whether an operator action may move a worker from `self` to `next`.
    ///
    /// `Pending -> {Active, Rejected}`, `Active <-> Inactive`, `Rejected -> Active`.
    /// Writing the current status again is always allowed.
    pub fn can_transition_to(&self, next: WorkerStatus) -> bool {
        use WorkerStatus::*;

        *self == next
            || matches!(
                (self, next),
                (Pending, Active)
                    | (Pending, Rejected)
                    | (Active, Inactive)
                    | (Inactive, Active)
                    | (Rejected, Active)
            )
    }

    /// Map free-text backend status onto the canonical set. Never fails.
    ///
    /// Precedence matters: "inactive"/"deactive" is tested before "active", and
    /// "reject" before "pending", so `"deactivated"` is Inactive and
    /// `"reject_pending"` is Rejected.
    pub fn normalize(raw: &str) -> WorkerStatus {
        let lowered = raw.to_lowercase();

        if lowered.contains("inactiv") || lowered.contains("deactiv") {
            return WorkerStatus::Inactive;
        }
        if lowered.contains("active") || lowered.contains("approved") || lowered.contains("super") {
            return WorkerStatus::Active;
        }
        if lowered.contains("reject") {
            return WorkerStatus::Rejected;
        }
        if lowered.contains("pending") || lowered.contains("review") {
            return WorkerStatus::Pending;
        }
        // Placeholder values the backend emits for unset statuses.
        if lowered == "string" || raw.chars().count() < 3 {
            return WorkerStatus::Pending;
        }

        tracing::warn!("unrecognized worker status {:?}, treating as Pending", raw);
        WorkerStatus::Pending
    }
}

impl core::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strict parse of a canonical name (case-insensitive). Use
/// [`WorkerStatus::normalize`] for backend text.
impl FromStr for WorkerStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkerStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown worker status: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deactivated_is_inactive_not_active() {
        assert_eq!(WorkerStatus::normalize("deactivated"), WorkerStatus::Inactive);
        assert_eq!(WorkerStatus::normalize("INACTIVE"), WorkerStatus::Inactive);
        assert_eq!(WorkerStatus::normalize("Deactivation requested"), WorkerStatus::Inactive);
        assert_eq!(WorkerStatus::normalize("inactivated"), WorkerStatus::Inactive);
    }

    #[test]
    fn active_family_maps_to_active() {
        assert_eq!(WorkerStatus::normalize("super_admin_active"), WorkerStatus::Active);
        assert_eq!(WorkerStatus::normalize("Approved"), WorkerStatus::Active);
        assert_eq!(WorkerStatus::normalize("superuser"), WorkerStatus::Active);
    }

    #[test]
    fn reject_wins_over_pending() {
        assert_eq!(WorkerStatus::normalize("reject_pending"), WorkerStatus::Rejected);
        assert_eq!(WorkerStatus::normalize("Rejected"), WorkerStatus::Rejected);
    }

    #[test]
    fn placeholders_and_garbage_are_pending() {
        assert_eq!(WorkerStatus::normalize(""), WorkerStatus::Pending);
        assert_eq!(WorkerStatus::normalize("STRING"), WorkerStatus::Pending);
        assert_eq!(WorkerStatus::normalize("ok"), WorkerStatus::Pending);
        assert_eq!(WorkerStatus::normalize("under review"), WorkerStatus::Pending);
        assert_eq!(WorkerStatus::normalize("on vacation"), WorkerStatus::Pending);
    }

    #[test]
    fn strict_parse_accepts_canonical_names_only() {
        assert_eq!("active".parse::<WorkerStatus>().unwrap(), WorkerStatus::Active);
        assert_eq!(" Rejected ".parse::<WorkerStatus>().unwrap(), WorkerStatus::Rejected);
        assert!("approved".parse::<WorkerStatus>().is_err());
    }

    #[test]
    fn transition_table() {
        use WorkerStatus::*;

        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));
        assert!(Rejected.can_transition_to(Active));
        assert!(Active.can_transition_to(Active));

        assert!(!Rejected.can_transition_to(Inactive));
        assert!(!Inactive.can_transition_to(Pending));
        assert!(!Active.can_transition_to(Rejected));
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: normalization is total and deterministic.
            #[test]
            fn normalize_is_total(raw in ".{0,40}") {
                let first = WorkerStatus::normalize(&raw);
                prop_assert!(WorkerStatus::ALL.contains(&first));
                prop_assert_eq!(first, WorkerStatus::normalize(&raw));
            }

            /// Property: any text mentioning "inactive" never reads as Active.
            #[test]
            fn inactive_mentions_never_active(prefix in "[a-z_ ]{0,10}", suffix in "[a-z_ ]{0,10}") {
                let raw = format!("{}inactive{}", prefix, suffix);
                prop_assert_eq!(WorkerStatus::normalize(&raw), WorkerStatus::Inactive);
            }

            #[test]
            fn deactivation_wording_never_active(prefix in "[a-z_ ]{0,10}", suffix in "[a-z_ ]{0,10}") {
                let raw = format!("{}deactivated{}", prefix, suffix);
                prop_assert_eq!(WorkerStatus::normalize(&raw), WorkerStatus::Inactive);
            }
        }
    }
}
