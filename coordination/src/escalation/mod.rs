//! Escalation: deterministic routing of a task up the specialist tiers
//!
//! A task enters at the TIER_1 specialist of its domain. After each
//! consultation the specialist's own handoff criteria decide whether the task
//! moves up. The engine never skips a declared prerequisite and never moves
//! down.
//!
//! ```text
//! TIER_1 generalist ── analyze → recommend
//!     │
//!     ├─ no criterion fires          → done (no-handoff)
//!     ├─ criterion targets TIER_2    → consult TIER_2
//!     ├─ criterion targets TIER_3    → consult missing prerequisites first
//!     │
//!     ▼
//! TIER_2 specialist ── analyze → recommend
//!     │
//!     ▼
//! TIER_3 architect ── analyze → recommend → done (exhausted)
//!
//! chain of records ──► aggregate ──► ConsolidatedResult
//! ```

pub mod aggregate;
pub mod engine;
pub mod state;
pub mod tier;

pub use aggregate::{
    aggregate, ConsolidatedResult, HandoffKind, HandoffStep, OverallTimeline, TimelineEstimate,
};
pub use engine::{EscalationEngine, EscalationOutcome};
pub use state::{
    ChainViolation, ConsultationChain, ConsultationRecord, ConsultationStatus, EngineState,
    TerminationReason, TransitionRecord,
};
pub use tier::Tier;
