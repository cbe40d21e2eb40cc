//! Architecture specialists: system shape, integrations and governance.

use super::{confidence_for, keyword_regex, matches, ARCHITECTURE};
use async_trait::async_trait;
use coordination::{
    Analysis, Context, HandoffCriterion, Recommendation, Specialist, SpecialistDescriptor,
    SpecialistError, Task, Tier, Timeline,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const ENTERPRISE_SCALE: &str = "enterprise-scale-system";
pub const REGULATED_MISSION_CRITICAL: &str = "regulated-mission-critical";
pub const CROSS_ORG_GOVERNANCE: &str = "cross-organization-governance";

static PATTERN_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "microservices",
        "microservice",
        "distributed",
        "event-driven",
        "event sourcing",
        "cqrs",
        "multi-region",
        "multiple regions",
        "multi-tenant",
        "enterprise",
        "high availability",
        "real-time",
        "service mesh",
    ])
    .expect("architecture pattern keywords should compile")
});

static INTEGRATION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "api",
        "apis",
        "database",
        "databases",
        "queue",
        "queues",
        "kafka",
        "cache",
        "payment",
        "payments",
        "crm",
        "erp",
        "webhook",
        "webhooks",
        "ldap",
        "search",
        "analytics",
        "cdn",
        "inventory",
        "billing",
        "warehouse",
        "sftp",
        "email",
        "sms",
    ])
    .expect("architecture integration keywords should compile")
});

static REGULATED_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "hipaa",
        "pci",
        "pci-dss",
        "sox",
        "gdpr",
        "banking",
        "healthcare",
        "mission-critical",
        "mission critical",
        "regulated",
        "life-safety",
    ])
    .expect("architecture regulation keywords should compile")
});

/// Heuristic assessment shared by all architecture tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureAnalysis {
    /// 0–10
    pub complexity_score: f64,
    pub integration_points: usize,
    pub patterns: Vec<String>,
    pub integrations: Vec<String>,
    pub regulated: bool,
    pub multi_org: bool,
}

impl ArchitectureAnalysis {
    /// Context hints: `integration_points` (number) raises the detected
    /// count, `regulated` and `multi_org` (flags) force the matching traits.
    pub fn assess(task: &Task, context: &Context) -> Self {
        let text = &task.description;
        let patterns = matches(&PATTERN_KEYWORDS, text);
        let integrations = matches(&INTEGRATION_KEYWORDS, text);

        let hinted = context
            .get_f64("integration_points")
            .map(|n| n.max(0.0) as usize)
            .unwrap_or(0);
        let integration_points = integrations.len().max(hinted);

        let raw = 2.0 + 1.5 * patterns.len() as f64 + 0.3 * integration_points as f64;
        let complexity_score = (raw.min(10.0) * 10.0).round() / 10.0;

        Self {
            complexity_score,
            integration_points,
            patterns: patterns.into_iter().collect(),
            integrations: integrations.into_iter().collect(),
            regulated: REGULATED_KEYWORDS.is_match(text) || context.flag("regulated"),
            multi_org: context.flag("multi_org"),
        }
    }
}

pub struct ArchitectureSpecialist {
    descriptor: SpecialistDescriptor,
}

impl ArchitectureSpecialist {
    pub fn for_tier(tier: Tier) -> Self {
        let descriptor = match tier {
            Tier::Tier1 => SpecialistDescriptor::new(
                "arch-1",
                "Architecture Generalist",
                ARCHITECTURE,
                Tier::Tier1,
            )
            .with_expertise(["system design", "layering", "technology selection"])
            .with_handoff(HandoffCriterion::new(
                ENTERPRISE_SCALE,
                "complexity above 7 with more than 5 integration points",
                Tier::Tier2,
                "arch-2",
            ))
            .with_handoff(HandoffCriterion::new(
                REGULATED_MISSION_CRITICAL,
                "regulated or mission-critical system needs enterprise review",
                Tier::Tier3,
                "arch-3",
            )),
            Tier::Tier2 => SpecialistDescriptor::new(
                "arch-2",
                "Solutions Architect",
                ARCHITECTURE,
                Tier::Tier2,
            )
            .with_expertise(["service decomposition", "integration design", "data ownership"])
            .with_prerequisite(Tier::Tier1)
            .with_handoff(HandoffCriterion::new(
                CROSS_ORG_GOVERNANCE,
                "integration web spans organizations and needs governance",
                Tier::Tier3,
                "arch-3",
            )),
            Tier::Tier3 => SpecialistDescriptor::new(
                "arch-3",
                "Enterprise Architect",
                ARCHITECTURE,
                Tier::Tier3,
            )
            .with_expertise(["governance", "platform strategy", "compliance architecture"])
            .with_prerequisite(Tier::Tier2),
        };
        Self { descriptor }
    }

    fn recommend(&self, a: &ArchitectureAnalysis) -> (String, serde_json::Value, Vec<String>, Timeline) {
        let ceiling = self.max_complexity_handled();
        match self.descriptor.tier {
            Tier::Tier1 => {
                let approach = if a.complexity_score <= 5.0 {
                    "modular monolith with clear module boundaries"
                } else {
                    "split along bounded contexts, integrations behind adapters"
                };
                let lower = 1.0 + a.complexity_score * 0.5;
                (
                    format!("Baseline architecture: {}", approach),
                    serde_json::json!({
                        "approach": approach,
                        "key_patterns": a.patterns,
                        "integration_points": a.integration_points,
                    }),
                    vec!["architecture decision record".into(), "dependency review".into()],
                    Timeline::weeks(lower, lower * 2.0, confidence_for(0.75, a.complexity_score, ceiling)),
                )
            }
            Tier::Tier2 => {
                let mut services: Vec<String> =
                    a.integrations.iter().map(|i| format!("{} adapter", i)).collect();
                if a.integration_points > 3 {
                    services.push("api gateway".into());
                }
                let lower = 4.0 + a.integration_points as f64;
                (
                    format!(
                        "Decompose into {} services with contract-tested integrations",
                        services.len().max(1)
                    ),
                    serde_json::json!({
                        "services": services,
                        "integration_points": a.integration_points,
                    }),
                    vec![
                        "integration contract tests".into(),
                        "load test at projected peak".into(),
                        "failure-mode review".into(),
                    ],
                    Timeline::weeks(lower, lower * 1.5, confidence_for(0.8, a.complexity_score, ceiling)),
                )
            }
            Tier::Tier3 => {
                let mut governance = vec!["architecture review board", "platform team ownership"];
                let mut checks = vec![
                    "architecture review board sign-off".to_string(),
                    "disaster recovery drill".to_string(),
                ];
                if a.regulated {
                    governance.push("compliance control mapping");
                    checks.push("compliance audit".into());
                }
                (
                    "Establish governance and a phased platform roadmap".to_string(),
                    serde_json::json!({ "governance": governance, "regulated": a.regulated }),
                    checks,
                    Timeline::weeks(
                        12.0,
                        12.0 + a.complexity_score * 2.0,
                        confidence_for(0.85, a.complexity_score, ceiling),
                    ),
                )
            }
        }
    }
}

#[async_trait]
impl Specialist for ArchitectureSpecialist {
    fn descriptor(&self) -> &SpecialistDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, task: &Task, context: &Context) -> Result<Analysis, SpecialistError> {
        let assessment = ArchitectureAnalysis::assess(task, context);
        Analysis::from_payload(
            &self.descriptor.id,
            format!(
                "complexity {:.1}, {} integration points, patterns: [{}]",
                assessment.complexity_score,
                assessment.integration_points,
                assessment.patterns.join(", ")
            ),
            &assessment,
        )
    }

    async fn generate_recommendations(
        &self,
        analysis: &Analysis,
        _task: &Task,
        _context: &Context,
    ) -> Result<Recommendation, SpecialistError> {
        let assessment: ArchitectureAnalysis = analysis.payload_as()?;
        let (summary, payload, checks, timeline) = self.recommend(&assessment);
        Ok(
            Recommendation::from_payload(&self.descriptor.id, summary, &payload, timeline)?
                .with_quality_checks(checks),
        )
    }

    fn evaluate_handoff_criterion(
        &self,
        criterion: &HandoffCriterion,
        analysis: &Analysis,
        _task: &Task,
    ) -> bool {
        let Ok(a) = analysis.payload_as::<ArchitectureAnalysis>() else {
            return false;
        };
        match criterion.condition.as_str() {
            ENTERPRISE_SCALE => a.complexity_score > 7.0 && a.integration_points > 5,
            REGULATED_MISSION_CRITICAL => a.regulated && a.complexity_score > 5.0,
            CROSS_ORG_GOVERNANCE => a.integration_points > 10 || a.multi_org,
            _ => false,
        }
    }

    fn max_complexity_handled(&self) -> f64 {
        match self.descriptor.tier {
            Tier::Tier1 => 5.0,
            Tier::Tier2 => 8.0,
            Tier::Tier3 => 10.0,
        }
    }
}
