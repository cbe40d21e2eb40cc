//! Escalation State: consultation records, the per-request chain, and the
//! engine's state/termination vocabulary

use crate::escalation::tier::Tier;
use crate::resilience::StageFailure;
use crate::specialist::{Analysis, Domain, HandoffCriterion, Recommendation, SpecialistId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    /// Both stages completed
    Ok,
    /// A stage failed, timed out or was cancelled
    Degraded,
}

/// One specialist's contribution to a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub specialist_id: SpecialistId,
    pub specialist_name: String,
    pub domain: Domain,
    pub tier: Tier,
    pub status: ConsultationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
    /// The criterion that fired on this record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_handoff: Option<HandoffCriterion>,
    /// Why the record is degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
    /// Set when the engine inserted this consultation to satisfy the
    /// prerequisites of another specialist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite_for: Option<SpecialistId>,
    /// Advisory ceiling reported by the specialist (diagnostics only)
    pub max_complexity_handled: f64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ConsultationRecord {
    pub fn is_degraded(&self) -> bool {
        self.status == ConsultationStatus::Degraded
    }

    pub fn confidence(&self) -> Option<f64> {
        self.recommendation.as_ref().map(Recommendation::confidence)
    }
}

/// Rejected append: the record would break a chain invariant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// Tier lower than the last record's tier
    TierRegression { last: Tier, attempted: Tier },
    /// Tier already present
    TierRepeated(Tier),
    /// Chain already holds one record per tier
    Full,
}

impl std::fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TierRegression { last, attempted } => {
                write!(f, "cannot move from {} down to {}", last, attempted)
            }
            Self::TierRepeated(tier) => write!(f, "{} already consulted", tier),
            Self::Full => write!(f, "chain already holds {} records", Tier::COUNT),
        }
    }
}

/// Whether `tier` may follow the already-visited `tiers` without breaking
/// ordering, uniqueness or the length bound.
pub fn admissible(tiers: &[Tier], tier: Tier) -> Result<(), ChainViolation> {
    if tiers.len() >= Tier::COUNT {
        return Err(ChainViolation::Full);
    }
    if tiers.contains(&tier) {
        return Err(ChainViolation::TierRepeated(tier));
    }
    if let Some(&last) = tiers.last() {
        if tier < last {
            return Err(ChainViolation::TierRegression {
                last,
                attempted: tier,
            });
        }
    }
    Ok(())
}

/// Ordered, append-only audit trail for one request.
///
/// Owned exclusively by the in-flight request; never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsultationChain {
    records: Vec<ConsultationRecord>,
}

impl ConsultationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a record at `tier` could be appended.
    pub fn admits(&self, tier: Tier) -> Result<(), ChainViolation> {
        admissible(&self.tiers(), tier)
    }

    /// Append a record, enforcing tier ordering, uniqueness and length.
    pub fn append(&mut self, record: ConsultationRecord) -> Result<(), ChainViolation> {
        self.admits(record.tier)?;
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[ConsultationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ConsultationRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ConsultationRecord> {
        self.records.last()
    }

    pub fn tiers(&self) -> Vec<Tier> {
        self.records.iter().map(|r| r.tier).collect()
    }

    pub fn highest_tier(&self) -> Option<Tier> {
        self.records.iter().map(|r| r.tier).max()
    }

    pub fn has_tier(&self, tier: Tier) -> bool {
        self.records.iter().any(|r| r.tier == tier)
    }

    /// A prerequisite is satisfied by any record at `tier` in `domain`.
    pub fn has_tier_in_domain(&self, tier: Tier, domain: &Domain) -> bool {
        self.records
            .iter()
            .any(|r| r.tier == tier && &r.domain == domain)
    }

    pub fn contains(&self, id: &SpecialistId) -> bool {
        self.records.iter().any(|r| &r.specialist_id == id)
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut ConsultationRecord> {
        self.records.last_mut()
    }
}

/// Why a chain stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum TerminationReason {
    /// No criterion matched below the top tier
    NoHandoff,
    /// The top tier was reached and nothing further applies
    Exhausted,
    /// A criterion matched but its target (or a prerequisite) could not be
    /// consulted
    EscalationUnavailable {
        target: SpecialistId,
        detail: String,
    },
    /// A stage on the last record failed or timed out
    StageFailed {
        specialist: SpecialistId,
        tier: Tier,
        detail: String,
    },
    /// The request was cancelled; the chain holds whatever finished
    Cancelled,
    /// Safety bound on the number of consultations reached
    TierLimitReached { limit: usize },
}

impl TerminationReason {
    /// Short kebab-case code, e.g. `no-handoff`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoHandoff => "no-handoff",
            Self::Exhausted => "exhausted",
            Self::EscalationUnavailable { .. } => "escalation-unavailable",
            Self::StageFailed { .. } => "stage-failed",
            Self::Cancelled => "cancelled",
            Self::TierLimitReached { .. } => "tier-limit-reached",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EscalationUnavailable { target, detail } => {
                write!(f, "escalation-unavailable ({}: {})", target, detail)
            }
            Self::StageFailed {
                specialist,
                tier,
                detail,
            } => write!(f, "stage-failed ({} at {}: {})", specialist, tier, detail),
            Self::TierLimitReached { limit } => write!(f, "tier-limit-reached ({})", limit),
            other => f.write_str(other.code()),
        }
    }
}

/// Engine state machine positions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EngineState {
    Start,
    Consulting {
        tier: Tier,
        specialist: SpecialistId,
    },
    EscalatePending {
        target_tier: Tier,
        target: SpecialistId,
        reason: String,
    },
    Terminated(TerminationReason),
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::Consulting { tier, specialist } => {
                write!(f, "CONSULTING({}, {})", tier, specialist)
            }
            Self::EscalatePending {
                target_tier,
                target,
                ..
            } => write!(f, "ESCALATE_PENDING({}, {})", target_tier, target),
            Self::Terminated(reason) => write!(f, "TERMINATED({})", reason.code()),
        }
    }
}

/// A recorded state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: EngineState,
    pub to: EngineState,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, tier: Tier) -> ConsultationRecord {
        ConsultationRecord {
            specialist_id: SpecialistId::new(id),
            specialist_name: id.to_string(),
            domain: Domain::new("architecture"),
            tier,
            status: ConsultationStatus::Ok,
            analysis: None,
            recommendation: None,
            triggered_handoff: None,
            failure: None,
            prerequisite_for: None,
            max_complexity_handled: 5.0,
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    #[test]
    fn test_chain_appends_ascending_tiers() {
        let mut chain = ConsultationChain::new();
        chain.append(record("a1", Tier::Tier1)).unwrap();
        chain.append(record("a3", Tier::Tier3)).unwrap();
        assert_eq!(chain.tiers(), vec![Tier::Tier1, Tier::Tier3]);
        assert_eq!(chain.highest_tier(), Some(Tier::Tier3));
        assert!(chain.has_tier_in_domain(Tier::Tier1, &Domain::new("architecture")));
        assert!(!chain.has_tier_in_domain(Tier::Tier1, &Domain::new("security")));
    }

    #[test]
    fn test_chain_rejects_regression_and_repeats() {
        let mut chain = ConsultationChain::new();
        chain.append(record("a2", Tier::Tier2)).unwrap();
        assert_eq!(
            chain.append(record("a1", Tier::Tier1)),
            Err(ChainViolation::TierRegression {
                last: Tier::Tier2,
                attempted: Tier::Tier1
            })
        );
        assert_eq!(
            chain.append(record("x2", Tier::Tier2)),
            Err(ChainViolation::TierRepeated(Tier::Tier2))
        );
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_termination_reason_serialization() {
        let reason = TerminationReason::EscalationUnavailable {
            target: SpecialistId::new("arch-2"),
            detail: "not registered".into(),
        };
        let json = serde_json::to_string(&reason).unwrap();
        assert!(json.contains("\"reason\":\"escalation-unavailable\""), "JSON: {json}");
        assert!(json.contains("\"target\":\"arch-2\""), "JSON: {json}");

        let back: TerminationReason = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reason);
        assert_eq!(back.code(), "escalation-unavailable");

        let plain = serde_json::to_string(&TerminationReason::NoHandoff).unwrap();
        assert_eq!(plain, r#"{"reason":"no-handoff"}"#);
    }

    #[test]
    fn test_engine_state_display() {
        let state = EngineState::Consulting {
            tier: Tier::Tier2,
            specialist: SpecialistId::new("sec-2"),
        };
        assert_eq!(state.to_string(), "CONSULTING(TIER_2, sec-2)");
        assert!(EngineState::Terminated(TerminationReason::Exhausted).is_terminal());
        assert!(!EngineState::Start.is_terminal());
    }
}
