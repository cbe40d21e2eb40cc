//! Error types for registry wiring and request start-up.
//!
//! Stage failures inside a request are *not* errors at this level: they are
//! recovered into degraded consultation records (see
//! [`StageFailure`](crate::resilience::StageFailure)).

use crate::escalation::tier::Tier;
use crate::specialist::{Domain, SpecialistId};
use thiserror::Error;

/// Invalid registry wiring. Raised only while building the registry, never
/// mid-request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("specialist '{0}' is registered more than once")]
    DuplicateSpecialist(SpecialistId),

    #[error("domain '{domain}' already has a {tier} specialist ('{existing}'), cannot add '{rejected}'")]
    DuplicateSlot {
        domain: Domain,
        tier: Tier,
        existing: SpecialistId,
        rejected: SpecialistId,
    },

    #[error("specialist '{specialist}' requires {prerequisite} but domain '{domain}' has no specialist at that tier")]
    MissingPrerequisite {
        specialist: SpecialistId,
        domain: Domain,
        prerequisite: Tier,
    },

    #[error("specialist '{specialist}' at {tier} declares prerequisite {prerequisite}, which is not a lower tier")]
    PrerequisiteNotLower {
        specialist: SpecialistId,
        tier: Tier,
        prerequisite: Tier,
    },

    #[error("criterion '{condition}' on '{specialist}' targets unregistered specialist '{target}'")]
    UnresolvedHandoffTarget {
        specialist: SpecialistId,
        condition: String,
        target: SpecialistId,
    },

    #[error("criterion '{condition}' on '{specialist}' targets '{target}' as {declared} but it is registered at {actual}")]
    HandoffTierMismatch {
        specialist: SpecialistId,
        condition: String,
        target: SpecialistId,
        declared: Tier,
        actual: Tier,
    },

    #[error("criterion '{condition}' on '{specialist}' ({from}) must target a higher tier, not {to}")]
    HandoffNotUpward {
        specialist: SpecialistId,
        condition: String,
        from: Tier,
        to: Tier,
    },

    #[error("criterion '{condition}' on '{specialist}' ({from}) hands off to '{target}' in domain '{domain}', whose prerequisite {prerequisite} can never be consulted after {from}")]
    UnreachablePrerequisite {
        specialist: SpecialistId,
        condition: String,
        target: SpecialistId,
        domain: Domain,
        from: Tier,
        prerequisite: Tier,
    },

    #[error("escalation wiring contains a cycle through {}", format_path(.path))]
    Cycle { path: Vec<SpecialistId> },

    #[error("registry is empty")]
    EmptyRegistry,
}

fn format_path(path: &[SpecialistId]) -> String {
    path.iter()
        .map(SpecialistId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A request that cannot start at all. Once the first consultation record
/// exists, the engine always returns a result instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationError {
    #[error("no entry-tier specialist registered for domain '{domain}' (task {task_id})")]
    NoEntrySpecialist { domain: Domain, task_id: String },

    #[error("entry specialist '{specialist}' for domain '{domain}' is unavailable: {reason}")]
    EntryUnavailable {
        domain: Domain,
        specialist: SpecialistId,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = ConfigError::Cycle {
            path: vec![SpecialistId::new("a"), SpecialistId::new("b"), SpecialistId::new("a")],
        };
        assert_eq!(
            err.to_string(),
            "escalation wiring contains a cycle through a -> b -> a"
        );
    }

    #[test]
    fn test_missing_prerequisite_message() {
        let err = ConfigError::MissingPrerequisite {
            specialist: SpecialistId::new("sec-3"),
            domain: Domain::new("security"),
            prerequisite: Tier::Tier2,
        };
        assert!(err.to_string().contains("requires TIER_2"));
    }
}
