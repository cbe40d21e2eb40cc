//! Result aggregation: folds a finished chain into one explainable answer
//!
//! Earlier records are retained, never overwritten: later tiers add context
//! on top of earlier findings. The actionable answer comes from the most
//! informed stage, while confidence follows the weakest link.

use crate::escalation::engine::EscalationOutcome;
use crate::escalation::state::{ConsultationRecord, TerminationReason, TransitionRecord};
use crate::escalation::tier::Tier;
use crate::specialist::{Domain, Recommendation, SpecialistId, Timeline};
use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A timeline estimate from one record, kept for traceability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEstimate {
    pub specialist_id: SpecialistId,
    pub tier: Tier,
    pub timeline: Timeline,
}

/// The authoritative timeline plus every earlier estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallTimeline {
    pub final_estimate: TimelineEstimate,
    pub prior_estimates: Vec<TimelineEstimate>,
}

/// How a step in the trail came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffKind {
    /// A handoff criterion fired on the `from` record.
    Criterion,
    /// The engine inserted `to` to satisfy a prerequisite.
    Prerequisite,
}

/// One escalation that actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffStep {
    pub from: SpecialistId,
    pub from_tier: Tier,
    pub to: SpecialistId,
    pub to_tier: Tier,
    pub reason: String,
    pub kind: HandoffKind,
}

/// Consolidated, serializable answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedResult {
    pub request_id: Uuid,
    pub task_id: TaskId,
    pub domain: Domain,
    /// Every record in visitation order.
    pub chain: Vec<ConsultationRecord>,
    /// Union of all quality checks, first-seen order.
    pub quality_checks: Vec<String>,
    /// Recommendation of the last record that produced one.
    pub final_recommendation: Option<Recommendation>,
    pub overall_timeline: Option<OverallTimeline>,
    /// Minimum confidence across the chain; degraded records count as zero.
    pub overall_confidence: f64,
    pub handoff_trail: Vec<HandoffStep>,
    pub termination: TerminationReason,
    /// Whether any record in the chain is degraded.
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<TransitionRecord>,
    pub completed_at: DateTime<Utc>,
}

impl ConsolidatedResult {
    /// Tier of the last record.
    pub fn final_tier(&self) -> Option<Tier> {
        self.chain.last().map(|r| r.tier)
    }

    pub fn escalated(&self) -> bool {
        !self.handoff_trail.is_empty()
    }

    /// One-line summary for logs and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "task={} domain={} records={} final_tier={} confidence={:.2} termination={}",
            self.task_id,
            self.domain,
            self.chain.len(),
            self.final_tier()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.overall_confidence,
            self.termination.code(),
        )
    }
}

/// Fold a finished run into a [`ConsolidatedResult`].
pub fn aggregate(outcome: EscalationOutcome) -> ConsolidatedResult {
    let EscalationOutcome {
        task_id,
        domain,
        chain,
        termination,
        transitions,
    } = outcome;
    let records = chain.into_records();

    ConsolidatedResult {
        request_id: Uuid::new_v4(),
        quality_checks: union_quality_checks(&records),
        final_recommendation: records
            .iter()
            .rev()
            .find_map(|r| r.recommendation.clone()),
        overall_timeline: overall_timeline(&records),
        overall_confidence: overall_confidence(&records),
        handoff_trail: handoff_trail(&records),
        degraded: records.iter().any(ConsultationRecord::is_degraded),
        task_id,
        domain,
        chain: records,
        termination,
        transitions,
        completed_at: Utc::now(),
    }
}

fn union_quality_checks(records: &[ConsultationRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.recommendation.as_ref())
        .flat_map(|rec| rec.quality_checks.iter())
        .filter(|check| seen.insert(check.as_str()))
        .cloned()
        .collect()
}

fn overall_timeline(records: &[ConsultationRecord]) -> Option<OverallTimeline> {
    let mut estimates: Vec<TimelineEstimate> = records
        .iter()
        .filter_map(|r| {
            r.recommendation.as_ref().map(|rec| TimelineEstimate {
                specialist_id: r.specialist_id.clone(),
                tier: r.tier,
                timeline: rec.timeline.clone(),
            })
        })
        .collect();
    let final_estimate = estimates.pop()?;
    Some(OverallTimeline {
        final_estimate,
        prior_estimates: estimates,
    })
}

fn overall_confidence(records: &[ConsultationRecord]) -> f64 {
    records
        .iter()
        .map(|r| r.confidence().unwrap_or(0.0))
        .reduce(f64::min)
        .unwrap_or(0.0)
}

/// Every adjacent pair in the chain is an escalation. An inserted
/// prerequisite carries its target; otherwise the reason comes from the
/// criterion that fired most recently.
fn handoff_trail(records: &[ConsultationRecord]) -> Vec<HandoffStep> {
    let mut trail = Vec::new();
    let mut pending_reason: Option<String> = None;

    for pair in records.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if let Some(criterion) = &from.triggered_handoff {
            pending_reason = Some(format!("{}: {}", criterion.condition, criterion.reason));
        }
        let (kind, reason) = match &to.prerequisite_for {
            Some(target) => (
                HandoffKind::Prerequisite,
                format!("prerequisite {} for {}", to.tier, target),
            ),
            None => (
                HandoffKind::Criterion,
                pending_reason.take().unwrap_or_default(),
            ),
        };
        trail.push(HandoffStep {
            from: from.specialist_id.clone(),
            from_tier: from.tier,
            to: to.specialist_id.clone(),
            to_tier: to.tier,
            reason,
            kind,
        });
    }
    trail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escalation::state::{ConsultationChain, ConsultationStatus};
    use crate::resilience::{FailureKind, Stage, StageFailure};
    use crate::specialist::HandoffCriterion;

    fn rec(id: &str, tier: Tier, confidence: f64, checks: &[&str]) -> ConsultationRecord {
        let sid = SpecialistId::new(id);
        ConsultationRecord {
            specialist_id: sid.clone(),
            specialist_name: id.to_string(),
            domain: Domain::new("architecture"),
            tier,
            status: ConsultationStatus::Ok,
            analysis: None,
            recommendation: Some(
                Recommendation::from_payload(
                    &sid,
                    format!("{id} says"),
                    &serde_json::json!({}),
                    Timeline::weeks(tier.ordinal() as f64, tier.ordinal() as f64 * 2.0, confidence),
                )
                .unwrap()
                .with_quality_checks(checks.iter().copied()),
            ),
            triggered_handoff: None,
            failure: None,
            prerequisite_for: None,
            max_complexity_handled: 5.0,
            started_at: Utc::now(),
            elapsed_ms: 1,
        }
    }

    fn outcome(records: Vec<ConsultationRecord>, termination: TerminationReason) -> EscalationOutcome {
        let mut chain = ConsultationChain::new();
        for r in records {
            chain.append(r).unwrap();
        }
        EscalationOutcome {
            task_id: TaskId::new("task-1"),
            domain: Domain::new("architecture"),
            chain,
            termination,
            transitions: Vec::new(),
        }
    }

    #[test]
    fn test_three_stage_aggregation() {
        let mut first = rec("arch-1", Tier::Tier1, 0.9, &["design review", "load test"]);
        first.triggered_handoff = Some(HandoffCriterion::new(
            "regulated-mission-critical",
            "mission critical",
            Tier::Tier3,
            "arch-3",
        ));
        let mut second = rec("arch-2", Tier::Tier2, 0.7, &["load test", "chaos drill"]);
        second.prerequisite_for = Some(SpecialistId::new("arch-3"));
        let third = rec("arch-3", Tier::Tier3, 0.8, &["governance sign-off"]);

        let result = aggregate(outcome(vec![first, second, third], TerminationReason::Exhausted));

        assert_eq!(result.chain.len(), 3);
        assert_eq!(
            result.quality_checks,
            vec!["design review", "load test", "chaos drill", "governance sign-off"]
        );
        assert_eq!(
            result.final_recommendation.as_ref().unwrap().produced_by.as_str(),
            "arch-3"
        );
        assert_eq!(result.overall_confidence, 0.7);

        let timeline = result.overall_timeline.as_ref().unwrap();
        assert_eq!(timeline.final_estimate.tier, Tier::Tier3);
        assert_eq!(timeline.prior_estimates.len(), 2);
        assert_eq!(timeline.prior_estimates[0].specialist_id.as_str(), "arch-1");

        assert_eq!(result.handoff_trail.len(), 2);
        assert_eq!(result.handoff_trail[0].kind, HandoffKind::Prerequisite);
        assert_eq!(result.handoff_trail[0].to.as_str(), "arch-2");
        assert_eq!(result.handoff_trail[1].kind, HandoffKind::Criterion);
        assert_eq!(result.handoff_trail[1].from.as_str(), "arch-2");
        assert!(result.handoff_trail[1]
            .reason
            .starts_with("regulated-mission-critical"));
        assert!(!result.degraded);
        assert_eq!(result.final_tier(), Some(Tier::Tier3));
    }

    #[test]
    fn test_degraded_tail_keeps_earlier_recommendation() {
        let mut first = rec("sec-1", Tier::Tier1, 0.85, &["threat model"]);
        first.triggered_handoff = Some(HandoffCriterion::new(
            "high-threat-surface",
            "threat high",
            Tier::Tier2,
            "sec-2",
        ));
        let mut second = rec("sec-2", Tier::Tier2, 0.0, &[]);
        second.status = ConsultationStatus::Degraded;
        second.recommendation = None;
        second.failure = Some(StageFailure::new(Stage::Analyze, FailureKind::Timeout, "slow"));

        let result = aggregate(outcome(
            vec![first, second],
            TerminationReason::StageFailed {
                specialist: SpecialistId::new("sec-2"),
                tier: Tier::Tier2,
                detail: "timeout".into(),
            },
        ));

        assert!(result.degraded);
        assert_eq!(
            result.final_recommendation.unwrap().produced_by.as_str(),
            "sec-1"
        );
        assert_eq!(result.overall_confidence, 0.0);
        assert_eq!(result.handoff_trail.len(), 1);
        assert_eq!(result.handoff_trail[0].reason, "high-threat-surface: threat high");
        let timeline = result.overall_timeline.unwrap();
        assert_eq!(timeline.final_estimate.specialist_id.as_str(), "sec-1");
        assert!(timeline.prior_estimates.is_empty());
    }

    #[test]
    fn test_single_record_summary() {
        let result = aggregate(outcome(
            vec![rec("perf-1", Tier::Tier1, 0.6, &["profile"])],
            TerminationReason::NoHandoff,
        ));
        assert!(!result.escalated());
        assert_eq!(
            result.summary(),
            "task=task-1 domain=architecture records=1 final_tier=TIER_1 confidence=0.60 termination=no-handoff"
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["termination"]["reason"], "no-handoff");
        assert_eq!(json["chain"][0]["status"], "OK");
    }
}
