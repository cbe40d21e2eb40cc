//! Specialist Coordination Library
//!
//! This library provides:
//! - A registry of domain specialists organized into three tiers
//! - A deterministic escalation engine that routes one task up the tiers
//! - Aggregation of the consultation chain into one explainable result
//!
//! # Flow
//!
//! ```text
//! Task ──► DomainClassifier ──► TIER_1 entry specialist
//!                                  │ handoff criteria
//!                                  ▼
//!                               TIER_2 / TIER_3 (prerequisites first)
//!                                  │
//!                                  ▼
//!                          ConsolidatedResult
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let registry = SpecialistRegistry::builder()
//!     .register(MyArchitectureGeneralist::new())
//!     .build()?;
//! let engine = EscalationEngine::new(registry, FixedDomain(Domain::new("architecture")));
//! let result = engine.consult(&task, &Context::new()).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod error;
pub mod escalation;
pub mod registry;
pub mod resilience;
pub mod router;
pub mod specialist;
pub mod task;

// Re-export key engine types
pub use config::EngineConfig;
pub use error::{ConfigError, EscalationError};
pub use escalation::{
    ConsolidatedResult, ConsultationChain, ConsultationRecord, ConsultationStatus,
    EscalationEngine, EscalationOutcome, HandoffKind, HandoffStep, TerminationReason, Tier,
};

// Re-export specialist contract types
pub use specialist::{
    Analysis, Domain, HandoffCriterion, Recommendation, Specialist, SpecialistDescriptor,
    SpecialistError, SpecialistId, Timeline,
};

// Re-export registry types
pub use registry::{SpecialistHealth, SpecialistRegistry, SpecialistRegistryBuilder, Unavailable};

// Re-export resilience types
pub use resilience::{FailureKind, Stage, StageFailure, StageGuard};

pub use router::{DomainClassifier, FixedDomain};
pub use task::{Context, Task, TaskId};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::specialist::{
        Analysis, HandoffCriterion, Recommendation, Specialist, SpecialistDescriptor,
        SpecialistError, Timeline,
    };
    use crate::task::{Context, Task};
    use async_trait::async_trait;

    /// Specialist that always succeeds and never hands off.
    pub struct StubSpecialist {
        descriptor: SpecialistDescriptor,
    }

    impl StubSpecialist {
        pub fn new(descriptor: SpecialistDescriptor) -> Self {
            Self { descriptor }
        }
    }

    #[async_trait]
    impl Specialist for StubSpecialist {
        fn descriptor(&self) -> &SpecialistDescriptor {
            &self.descriptor
        }

        async fn analyze(&self, task: &Task, _context: &Context) -> Result<Analysis, SpecialistError> {
            Analysis::from_payload(
                &self.descriptor.id,
                format!("stub analysis of {}", task.id),
                &serde_json::json!({}),
            )
        }

        async fn generate_recommendations(
            &self,
            _analysis: &Analysis,
            _task: &Task,
            _context: &Context,
        ) -> Result<Recommendation, SpecialistError> {
            Recommendation::from_payload(
                &self.descriptor.id,
                "stub recommendation",
                &serde_json::json!({}),
                Timeline::weeks(1.0, 2.0, 0.5),
            )
        }

        fn evaluate_handoff_criterion(
            &self,
            _criterion: &HandoffCriterion,
            _analysis: &Analysis,
            _task: &Task,
        ) -> bool {
            false
        }

        fn max_complexity_handled(&self) -> f64 {
            5.0
        }
    }
}
