//! Specialist contract: the polymorphic unit every (domain, tier) pair implements.
//!
//! A specialist is a stateless strategy registered in the
//! [`SpecialistRegistry`](crate::registry::SpecialistRegistry). The engine only
//! ever calls the four contract methods:
//!
//! ```text
//! analyze(task, context)                       → Analysis
//! generate_recommendations(analysis, task, ..) → Recommendation
//! evaluate_handoff_criterion(criterion, ..)    → bool
//! max_complexity_handled()                     → f64 (advisory)
//! ```
//!
//! Analyses and recommendations are domain-opaque: the payload is a JSON value
//! the producing specialist serializes and later deserializes itself.

use crate::escalation::tier::Tier;
use crate::task::{Context, Task};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Domain a specialist covers (e.g. "architecture", "security").
///
/// Always stored lowercase so classifier output and registry keys compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Domain {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Registry-unique specialist identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecialistId(String);

impl SpecialistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpecialistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecialistId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A named condition that, when its predicate holds, redirects the engine to a
/// higher-tier specialist.
///
/// The predicate itself lives in the owning specialist's
/// [`Specialist::evaluate_handoff_criterion`]; the criterion is pure data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffCriterion {
    /// Machine-readable condition name, e.g. `enterprise-scale-system`.
    pub condition: String,
    /// Human-readable justification recorded in the handoff trail.
    pub reason: String,
    pub target_tier: Tier,
    pub target_specialist_id: SpecialistId,
}

impl HandoffCriterion {
    pub fn new(
        condition: impl Into<String>,
        reason: impl Into<String>,
        target_tier: Tier,
        target_specialist_id: impl Into<String>,
    ) -> Self {
        Self {
            condition: condition.into(),
            reason: reason.into(),
            target_tier,
            target_specialist_id: SpecialistId::new(target_specialist_id),
        }
    }
}

/// Static description of a specialist: identity, placement and wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialistDescriptor {
    pub id: SpecialistId,
    pub name: String,
    pub domain: Domain,
    pub tier: Tier,
    #[serde(default)]
    pub expertise: BTreeSet<String>,
    /// Tiers that must already have a record in the chain (declaration order).
    #[serde(default)]
    pub prerequisites: Vec<Tier>,
    /// Evaluated in declaration order; the first match wins.
    #[serde(default)]
    pub handoff_criteria: Vec<HandoffCriterion>,
}

impl SpecialistDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        domain: impl AsRef<str>,
        tier: Tier,
    ) -> Self {
        Self {
            id: SpecialistId::new(id),
            name: name.into(),
            domain: Domain::new(domain),
            tier,
            expertise: BTreeSet::new(),
            prerequisites: Vec::new(),
            handoff_criteria: Vec::new(),
        }
    }

    pub fn with_expertise<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise.extend(areas.into_iter().map(Into::into));
        self
    }

    /// Add a prerequisite tier. Repeats are ignored so the list stays an
    /// ordered set.
    pub fn with_prerequisite(mut self, tier: Tier) -> Self {
        if !self.prerequisites.contains(&tier) {
            self.prerequisites.push(tier);
        }
        self
    }

    pub fn with_handoff(mut self, criterion: HandoffCriterion) -> Self {
        self.handoff_criteria.push(criterion);
        self
    }
}

/// Domain-opaque output of [`Specialist::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// The specialist that produced this analysis.
    pub produced_by: SpecialistId,
    pub summary: String,
    pub payload: Value,
}

impl Analysis {
    /// Wrap a typed analysis into its opaque form.
    pub fn from_payload<T: Serialize>(
        produced_by: &SpecialistId,
        summary: impl Into<String>,
        payload: &T,
    ) -> Result<Self, SpecialistError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| SpecialistError::Analysis(format!("payload encode failed: {e}")))?;
        Ok(Self {
            produced_by: produced_by.clone(),
            summary: summary.into(),
            payload,
        })
    }

    /// Recover the typed analysis. Only the producing specialist knows `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, SpecialistError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| SpecialistError::Analysis(format!("payload decode failed: {e}")))
    }
}

/// Estimated effort range with a confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub unit: String,
    pub confidence: f64,
}

impl Timeline {
    /// Bounds are reordered if given backwards; confidence is clamped.
    pub fn new(lower_bound: f64, upper_bound: f64, unit: impl Into<String>, confidence: f64) -> Self {
        let (lower_bound, upper_bound) = if lower_bound <= upper_bound {
            (lower_bound, upper_bound)
        } else {
            (upper_bound, lower_bound)
        };
        Self {
            lower_bound: lower_bound.max(0.0),
            upper_bound: upper_bound.max(0.0),
            unit: unit.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn weeks(lower: f64, upper: f64, confidence: f64) -> Self {
        Self::new(lower, upper, "weeks", confidence)
    }
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{} {} (confidence {:.2})",
            self.lower_bound, self.upper_bound, self.unit, self.confidence
        )
    }
}

/// Domain-opaque output of [`Specialist::generate_recommendations`] plus the
/// fields every recommendation shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub produced_by: SpecialistId,
    pub summary: String,
    pub payload: Value,
    /// Ordered set: first occurrence wins.
    #[serde(default)]
    pub quality_checks: Vec<String>,
    pub timeline: Timeline,
}

impl Recommendation {
    pub fn from_payload<T: Serialize>(
        produced_by: &SpecialistId,
        summary: impl Into<String>,
        payload: &T,
        timeline: Timeline,
    ) -> Result<Self, SpecialistError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| SpecialistError::Recommendation(format!("payload encode failed: {e}")))?;
        Ok(Self {
            produced_by: produced_by.clone(),
            summary: summary.into(),
            payload,
            quality_checks: Vec::new(),
            timeline,
        })
    }

    pub fn with_quality_checks<I, S>(mut self, checks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for check in checks {
            let check = check.into();
            if !self.quality_checks.contains(&check) {
                self.quality_checks.push(check);
            }
        }
        self
    }

    pub fn confidence(&self) -> f64 {
        self.timeline.confidence
    }
}

/// Failure raised by a specialist stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpecialistError {
    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("recommendation failed: {0}")]
    Recommendation(String),

    #[error("analysis produced by '{produced_by}' cannot be used by '{consumer}'")]
    ForeignAnalysis {
        produced_by: SpecialistId,
        consumer: SpecialistId,
    },
}

/// Contract every (domain, tier) specialist satisfies.
///
/// Implementations must be stateless: all methods take `&self` and must not
/// mutate interior state, so one instance can serve concurrent requests.
#[async_trait]
pub trait Specialist: Send + Sync {
    fn descriptor(&self) -> &SpecialistDescriptor;

    /// Analyze the task. May await context-provided lookups.
    async fn analyze(&self, task: &Task, context: &Context) -> Result<Analysis, SpecialistError>;

    /// Turn this specialist's own analysis into a recommendation.
    async fn generate_recommendations(
        &self,
        analysis: &Analysis,
        task: &Task,
        context: &Context,
    ) -> Result<Recommendation, SpecialistError>;

    /// Deterministic predicate for one of this specialist's criteria.
    fn evaluate_handoff_criterion(
        &self,
        criterion: &HandoffCriterion,
        analysis: &Analysis,
        task: &Task,
    ) -> bool;

    /// Advisory ceiling, recorded for diagnostics only.
    fn max_complexity_handled(&self) -> f64;

    fn id(&self) -> &SpecialistId {
        &self.descriptor().id
    }

    fn tier(&self) -> Tier {
        self.descriptor().tier
    }

    fn domain(&self) -> &Domain {
        &self.descriptor().domain
    }
}
