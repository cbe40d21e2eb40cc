//! Escalation Engine: drives one task through zero or more tiers
//!
//! The engine is a deterministic state machine over the
//! [`SpecialistRegistry`]. Specialists do the domain work; the engine only
//! sequences them, enforces the chain invariants and recovers failures.
//!
//! ```text
//! START
//!   │ domain_of(task) → entry TIER_1 specialist
//!   ▼
//! CONSULTING(tier, specialist) ── analyze → recommend → append record
//!   │  stage degraded            → TERMINATED(stage-failed | cancelled)
//!   │  no criterion matched      → TERMINATED(no-handoff | exhausted)
//!   │  first matching criterion  ↓
//!   ▼
//! ESCALATE_PENDING(target_tier, target, reason)
//!   │  target/prerequisite unresolvable → TERMINATED(escalation-unavailable)
//!   │  consultation bound reached       → TERMINATED(tier-limit-reached)
//!   │  missing prerequisite tiers       → CONSULTING(prerequisite) ...
//!   ▼
//! CONSULTING(target_tier, target)
//! ```
//!
//! Escalation decisions are local: each specialist judges its own criteria.
//! Complexity scores from different domains are never compared.

use crate::config::EngineConfig;
use crate::error::EscalationError;
use crate::escalation::aggregate::{aggregate, ConsolidatedResult};
use crate::escalation::state::{
    admissible, ConsultationChain, ConsultationRecord, ConsultationStatus, EngineState,
    TerminationReason, TransitionRecord,
};
use crate::registry::SpecialistRegistry;
use crate::resilience::{FailureKind, Stage, StageFailure, StageGuard};
use crate::router::DomainClassifier;
use crate::specialist::{Domain, HandoffCriterion, Specialist, SpecialistError, SpecialistId};
use crate::task::{Context, Task, TaskId};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything a finished run produced, before aggregation.
#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    pub task_id: TaskId,
    pub domain: Domain,
    pub chain: ConsultationChain,
    pub termination: TerminationReason,
    pub transitions: Vec<TransitionRecord>,
}

/// Mutable state of one in-flight request. Never shared.
struct Run {
    task_id: TaskId,
    state: EngineState,
    chain: ConsultationChain,
    transitions: Vec<TransitionRecord>,
}

impl Run {
    fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: EngineState::Start,
            chain: ConsultationChain::new(),
            transitions: Vec::new(),
        }
    }

    fn advance(&mut self, to: EngineState) {
        debug!(task_id = %self.task_id, from = %self.state, to = %to, "Engine transition");
        let from = std::mem::replace(&mut self.state, to.clone());
        self.transitions.push(TransitionRecord {
            from,
            to,
            at: Utc::now(),
        });
    }

    fn terminate(&mut self, reason: TerminationReason) {
        self.advance(EngineState::Terminated(reason));
    }

    fn termination(&self) -> TerminationReason {
        match &self.state {
            EngineState::Terminated(reason) => reason.clone(),
            // only read after a terminal transition
            _ => TerminationReason::Cancelled,
        }
    }
}

/// The escalation engine. Stateless between requests; share it behind an
/// `Arc` to serve concurrent requests.
pub struct EscalationEngine<C> {
    registry: SpecialistRegistry,
    classifier: C,
    config: EngineConfig,
}

impl<C: DomainClassifier> EscalationEngine<C> {
    /// Create an engine with default config
    pub fn new(registry: SpecialistRegistry, classifier: C) -> Self {
        Self::with_config(registry, classifier, EngineConfig::default())
    }

    /// Create with custom config
    pub fn with_config(registry: SpecialistRegistry, classifier: C, config: EngineConfig) -> Self {
        Self {
            registry,
            classifier,
            config,
        }
    }

    pub fn registry(&self) -> &SpecialistRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Most consultations a single chain may hold.
    pub fn consultation_limit(&self) -> usize {
        let tiers = self.registry.tier_count();
        self.config
            .max_consultations
            .map_or(tiers, |max| max.min(tiers))
    }

    /// Run the chain and aggregate it.
    pub async fn consult(
        &self,
        task: &Task,
        context: &Context,
    ) -> Result<ConsolidatedResult, EscalationError> {
        self.consult_with_cancel(task, context, CancellationToken::new())
            .await
    }

    /// Like [`consult`](Self::consult); cancelling `cancel` returns the partial
    /// chain accumulated so far.
    pub async fn consult_with_cancel(
        &self,
        task: &Task,
        context: &Context,
        cancel: CancellationToken,
    ) -> Result<ConsolidatedResult, EscalationError> {
        let outcome = self.run(task, context, cancel).await?;
        Ok(aggregate(outcome))
    }

    /// Run independent requests concurrently. Each request owns its chain;
    /// nothing is shared between them.
    pub async fn consult_all(
        &self,
        requests: &[(Task, Context)],
    ) -> Vec<Result<ConsolidatedResult, EscalationError>> {
        futures::future::join_all(
            requests
                .iter()
                .map(|(task, context)| self.consult(task, context)),
        )
        .await
    }

    /// Drive the state machine to a terminal state.
    pub async fn run(
        &self,
        task: &Task,
        context: &Context,
        cancel: CancellationToken,
    ) -> Result<EscalationOutcome, EscalationError> {
        let domain = self.classifier.domain_of(task);
        let entry_id = self
            .registry
            .entry_for(&domain)
            .map(|entry| entry.descriptor().id.clone())
            .ok_or_else(|| EscalationError::NoEntrySpecialist {
                domain: domain.clone(),
                task_id: task.id.to_string(),
            })?;
        let mut current =
            self.registry
                .available(&entry_id)
                .map_err(|u| EscalationError::EntryUnavailable {
                    domain: domain.clone(),
                    specialist: entry_id.clone(),
                    reason: u.to_string(),
                })?;

        let analyze_guard = StageGuard::new(self.config.analyze_timeout(), cancel.clone());
        let recommend_guard = StageGuard::new(self.config.recommend_timeout(), cancel);
        let limit = self.consultation_limit();

        info!(task_id = %task.id, %domain, entry = %entry_id, limit, "Starting consultation chain");

        let mut run = Run::new(task.id.clone());
        run.advance(EngineState::Consulting {
            tier: current.tier(),
            specialist: entry_id,
        });

        'chain: loop {
            let record = self
                .consult_one(&current, task, context, &analyze_guard, &recommend_guard, None)
                .await;
            if let Some(reason) = self.append(&mut run, record) {
                run.terminate(reason);
                break 'chain;
            }

            let Some(criterion) = self.first_matching_criterion(&current, &run.chain, task) else {
                let reason = if current.tier().is_top() {
                    TerminationReason::Exhausted
                } else {
                    TerminationReason::NoHandoff
                };
                run.terminate(reason);
                break 'chain;
            };

            info!(
                task_id = %task.id,
                specialist = %current.id(),
                condition = %criterion.condition,
                target = %criterion.target_specialist_id,
                "Handoff criterion matched"
            );
            if let Some(last) = run.chain.last_mut() {
                last.triggered_handoff = Some(criterion.clone());
            }
            run.advance(EngineState::EscalatePending {
                target_tier: criterion.target_tier,
                target: criterion.target_specialist_id.clone(),
                reason: criterion.reason.clone(),
            });

            if analyze_guard.is_cancelled() {
                run.terminate(TerminationReason::Cancelled);
                break 'chain;
            }

            let (target, prerequisites) = match self.plan_escalation(&criterion, &run.chain, limit)
            {
                Ok(plan) => plan,
                Err(reason) => {
                    warn!(task_id = %task.id, %reason, "Escalation not possible");
                    run.terminate(reason);
                    break 'chain;
                }
            };

            for prerequisite in prerequisites {
                info!(
                    task_id = %task.id,
                    prerequisite = %prerequisite.id(),
                    tier = %prerequisite.tier(),
                    for_target = %target.id(),
                    "Inserting prerequisite consultation"
                );
                run.advance(EngineState::Consulting {
                    tier: prerequisite.tier(),
                    specialist: prerequisite.id().clone(),
                });
                let record = self
                    .consult_one(
                        &prerequisite,
                        task,
                        context,
                        &analyze_guard,
                        &recommend_guard,
                        Some(target.id().clone()),
                    )
                    .await;
                if let Some(reason) = self.append(&mut run, record) {
                    run.terminate(reason);
                    break 'chain;
                }
            }

            run.advance(EngineState::Consulting {
                tier: target.tier(),
                specialist: target.id().clone(),
            });
            current = target;
        }

        let termination = run.termination();
        info!(
            task_id = %task.id,
            records = run.chain.len(),
            tiers = ?run.chain.tiers(),
            termination = %termination,
            "Consultation chain finished"
        );

        Ok(EscalationOutcome {
            task_id: task.id.clone(),
            domain,
            chain: run.chain,
            termination,
            transitions: run.transitions,
        })
    }

    /// Append a record; returns a termination reason when the chain must stop.
    ///
    /// A consultation interrupted by cancellation is only kept when it is the
    /// first one, so the chain is never empty.
    fn append(&self, run: &mut Run, record: ConsultationRecord) -> Option<TerminationReason> {
        let cancelled = record
            .failure
            .as_ref()
            .is_some_and(StageFailure::is_cancellation);
        if cancelled && !run.chain.is_empty() {
            debug!(task_id = %run.task_id, specialist = %record.specialist_id, "Dropping cancelled consultation");
            return Some(TerminationReason::Cancelled);
        }

        let failure = record.failure.clone();
        let specialist = record.specialist_id.clone();
        let tier = record.tier;

        if let Err(violation) = run.chain.append(record) {
            return Some(TerminationReason::EscalationUnavailable {
                target: specialist,
                detail: violation.to_string(),
            });
        }

        failure.map(|failure| {
            if failure.is_cancellation() {
                TerminationReason::Cancelled
            } else {
                TerminationReason::StageFailed {
                    specialist,
                    tier,
                    detail: failure.to_string(),
                }
            }
        })
    }

    /// Criteria are evaluated in declaration order; the first true predicate
    /// wins. Never re-sorted.
    fn first_matching_criterion(
        &self,
        specialist: &Arc<dyn Specialist>,
        chain: &ConsultationChain,
        task: &Task,
    ) -> Option<HandoffCriterion> {
        let analysis = chain.last()?.analysis.as_ref()?;
        specialist
            .descriptor()
            .handoff_criteria
            .iter()
            .find(|criterion| {
                let matched = specialist.evaluate_handoff_criterion(criterion, analysis, task);
                debug!(
                    specialist = %specialist.id(),
                    condition = %criterion.condition,
                    matched,
                    "Evaluated handoff criterion"
                );
                matched
            })
            .cloned()
    }

    /// Resolve the target and every prerequisite consultation that must run
    /// before it, in ascending tier order.
    #[allow(clippy::type_complexity)]
    fn plan_escalation(
        &self,
        criterion: &HandoffCriterion,
        chain: &ConsultationChain,
        limit: usize,
    ) -> Result<(Arc<dyn Specialist>, Vec<Arc<dyn Specialist>>), TerminationReason> {
        let target_id = &criterion.target_specialist_id;
        let unavailable = |detail: String| TerminationReason::EscalationUnavailable {
            target: target_id.clone(),
            detail,
        };

        let target = self
            .registry
            .available(target_id)
            .map_err(|u| unavailable(u.to_string()))?;

        let descriptor = target.descriptor();
        let mut missing = descriptor
            .prerequisites
            .iter()
            .copied()
            .filter(|tier| !chain.has_tier_in_domain(*tier, &descriptor.domain))
            .collect::<Vec<_>>();
        missing.sort();

        let mut planned = chain.tiers();
        let mut prerequisites = Vec::with_capacity(missing.len());
        for tier in missing {
            let specialist = self
                .registry
                .available_at(&descriptor.domain, tier)
                .map_err(|u| unavailable(format!("prerequisite {} unresolvable: {}", tier, u)))?;
            admissible(&planned, tier).map_err(|v| {
                unavailable(format!("prerequisite {} cannot be inserted: {}", tier, v))
            })?;
            planned.push(tier);
            prerequisites.push(specialist);
        }
        admissible(&planned, descriptor.tier).map_err(|v| unavailable(v.to_string()))?;

        let needed = chain.len() + prerequisites.len() + 1;
        if needed > limit {
            return Err(TerminationReason::TierLimitReached { limit });
        }

        Ok((target, prerequisites))
    }

    /// Run analyze then recommend for one specialist and build its record.
    async fn consult_one(
        &self,
        specialist: &Arc<dyn Specialist>,
        task: &Task,
        context: &Context,
        analyze_guard: &StageGuard,
        recommend_guard: &StageGuard,
        prerequisite_for: Option<SpecialistId>,
    ) -> ConsultationRecord {
        let descriptor = specialist.descriptor();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            task_id = %task.id,
            specialist = %descriptor.id,
            tier = %descriptor.tier,
            "Consulting specialist"
        );

        let mut analysis = None;
        let mut recommendation = None;
        let mut failure = None;

        match analyze_guard
            .run(Stage::Analyze, specialist.analyze(task, context))
            .await
        {
            Ok(produced) if produced.produced_by != descriptor.id => {
                failure = Some(StageFailure::new(
                    Stage::Recommend,
                    FailureKind::Error,
                    SpecialistError::ForeignAnalysis {
                        produced_by: produced.produced_by.clone(),
                        consumer: descriptor.id.clone(),
                    }
                    .to_string(),
                ));
            }
            Ok(produced) => {
                match recommend_guard
                    .run(
                        Stage::Recommend,
                        specialist.generate_recommendations(&produced, task, context),
                    )
                    .await
                {
                    Ok(rec) => {
                        analysis = Some(produced);
                        recommendation = Some(rec);
                    }
                    Err(f) => failure = Some(f),
                }
            }
            Err(f) => failure = Some(f),
        }

        let status = if failure.is_some() {
            ConsultationStatus::Degraded
        } else {
            ConsultationStatus::Ok
        };
        if let Some(f) = &failure {
            warn!(
                task_id = %task.id,
                specialist = %descriptor.id,
                tier = %descriptor.tier,
                failure = %f,
                "Consultation degraded"
            );
        }

        ConsultationRecord {
            specialist_id: descriptor.id.clone(),
            specialist_name: descriptor.name.clone(),
            domain: descriptor.domain.clone(),
            tier: descriptor.tier,
            status,
            analysis,
            recommendation,
            triggered_handoff: None,
            failure,
            prerequisite_for,
            max_complexity_handled: specialist.max_complexity_handled(),
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        }
    }
}
