//! Security specialists: threat surface, authentication and security architecture.

use super::{confidence_for, keyword_regex, matches, SECURITY};
use async_trait::async_trait;
use coordination::{
    Analysis, Context, HandoffCriterion, Recommendation, Specialist, SpecialistDescriptor,
    SpecialistError, Task, Tier, Timeline,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const HIGH_THREAT_SURFACE: &str = "high-threat-surface";
pub const AUTHENTICATION_REQUIRED: &str = "authentication-required";
pub const CRITICAL_THREAT: &str = "critical-threat";

static SENSITIVE_DATA: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "pii",
        "personal data",
        "payment",
        "payments",
        "credit card",
        "health",
        "medical",
        "password",
        "passwords",
        "credentials",
        "ssn",
        "secrets",
        "financial",
    ])
    .expect("security data keywords should compile")
});

static EXPOSURE: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "public",
        "internet-facing",
        "api",
        "apis",
        "upload",
        "uploads",
        "third-party",
        "webhook",
        "mobile",
        "admin",
        "multi-tenant",
    ])
    .expect("security exposure keywords should compile")
});

static ATTACK_VECTORS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "injection",
        "xss",
        "csrf",
        "ssrf",
        "deserialization",
        "rce",
        "privilege escalation",
    ])
    .expect("security attack keywords should compile")
});

static AUTH_REQUIREMENTS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "oauth",
        "oauth2",
        "oidc",
        "sso",
        "single sign-on",
        "mfa",
        "2fa",
        "jwt",
        "rbac",
        "role-based",
        "saml",
        "access control",
        "permissions",
    ])
    .expect("security auth keywords should compile")
});

/// Coarse threat classification derived from the threat score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub fn from_score(score: f64) -> Self {
        if score < 3.0 {
            Self::Low
        } else if score < 6.0 {
            Self::Medium
        } else if score < 9.0 {
            Self::High
        } else {
            Self::Critical
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityAnalysis {
    pub threat_score: f64,
    pub threat_level: ThreatLevel,
    pub requires_auth: bool,
    pub sensitive_data: Vec<String>,
    pub exposure: Vec<String>,
    pub attack_vectors: Vec<String>,
}

impl SecurityAnalysis {
    /// Context hints: `internet_facing` and `requires_auth` flags.
    pub fn assess(task: &Task, context: &Context) -> Self {
        let text = &task.description;
        let sensitive_data = matches(&SENSITIVE_DATA, text);
        let exposure = matches(&EXPOSURE, text);
        let attack_vectors = matches(&ATTACK_VECTORS, text);

        let mut score = 2.0 * sensitive_data.len() as f64
            + 1.5 * exposure.len() as f64
            + 2.0 * attack_vectors.len() as f64;
        if context.flag("internet_facing") {
            score += 1.5;
        }
        let threat_score = (score * 10.0).round() / 10.0;

        Self {
            threat_score,
            threat_level: ThreatLevel::from_score(threat_score),
            requires_auth: AUTH_REQUIREMENTS.is_match(text) || context.flag("requires_auth"),
            sensitive_data: sensitive_data.into_iter().collect(),
            exposure: exposure.into_iter().collect(),
            attack_vectors: attack_vectors.into_iter().collect(),
        }
    }
}

pub struct SecuritySpecialist {
    descriptor: SpecialistDescriptor,
}

impl SecuritySpecialist {
    pub fn for_tier(tier: Tier) -> Self {
        let descriptor = match tier {
            Tier::Tier1 => {
                SpecialistDescriptor::new("sec-1", "Security Generalist", SECURITY, Tier::Tier1)
                    .with_expertise(["secure defaults", "dependency hygiene", "input validation"])
                    .with_handoff(HandoffCriterion::new(
                        HIGH_THREAT_SURFACE,
                        "threat level high or critical",
                        Tier::Tier2,
                        "sec-2",
                    ))
                    .with_handoff(HandoffCriterion::new(
                        AUTHENTICATION_REQUIRED,
                        "authentication or authorization design required",
                        Tier::Tier2,
                        "sec-2",
                    ))
            }
            Tier::Tier2 => SpecialistDescriptor::new(
                "sec-2",
                "Application Security Specialist",
                SECURITY,
                Tier::Tier2,
            )
            .with_expertise(["threat modeling", "identity and access", "penetration testing"])
            .with_prerequisite(Tier::Tier1)
            .with_handoff(HandoffCriterion::new(
                CRITICAL_THREAT,
                "critical threat needs security architecture review",
                Tier::Tier3,
                "sec-3",
            )),
            Tier::Tier3 => {
                SpecialistDescriptor::new("sec-3", "Security Architect", SECURITY, Tier::Tier3)
                    .with_expertise(["zero trust", "key management", "incident response"])
                    .with_prerequisite(Tier::Tier2)
            }
        };
        Self { descriptor }
    }

    fn recommend(&self, a: &SecurityAnalysis) -> (String, serde_json::Value, Vec<String>, Timeline) {
        let ceiling = self.max_complexity_handled();
        match self.descriptor.tier {
            Tier::Tier1 => {
                let mut controls = vec!["input validation", "secure session cookies"];
                if !a.sensitive_data.is_empty() {
                    controls.push("encryption at rest for sensitive fields");
                }
                (
                    format!("Apply baseline controls ({} threat)", a.threat_level),
                    serde_json::json!({ "controls": controls, "threat_level": a.threat_level }),
                    vec![
                        "dependency vulnerability scan".into(),
                        "OWASP top 10 checklist".into(),
                    ],
                    Timeline::weeks(
                        1.0,
                        1.0 + a.threat_score * 0.3,
                        confidence_for(0.8, a.threat_score, ceiling),
                    ),
                )
            }
            Tier::Tier2 => {
                let mut controls = vec!["threat model", "security logging and alerting"];
                let mut checks = vec!["threat model review".to_string(), "penetration test".to_string()];
                if a.requires_auth {
                    controls.push("OAuth2/OIDC with PKCE");
                    controls.push("MFA for privileged roles");
                    checks.push("authorization matrix tests".into());
                }
                (
                    format!("Threat-model and harden {} exposure points", a.exposure.len()),
                    serde_json::json!({
                        "controls": controls,
                        "attack_vectors": a.attack_vectors,
                    }),
                    checks,
                    Timeline::weeks(
                        3.0,
                        3.0 + a.threat_score * 0.5,
                        confidence_for(0.8, a.threat_score, ceiling),
                    ),
                )
            }
            Tier::Tier3 => (
                "Adopt a zero-trust security architecture".to_string(),
                serde_json::json!({
                    "principles": ["zero trust", "centralized key management", "least privilege"],
                    "threat_level": a.threat_level,
                }),
                vec![
                    "external security audit".into(),
                    "incident response tabletop".into(),
                ],
                Timeline::weeks(8.0, 16.0, confidence_for(0.85, a.threat_score, ceiling)),
            ),
        }
    }
}

#[async_trait]
impl Specialist for SecuritySpecialist {
    fn descriptor(&self) -> &SpecialistDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, task: &Task, context: &Context) -> Result<Analysis, SpecialistError> {
        let assessment = SecurityAnalysis::assess(task, context);
        Analysis::from_payload(
            &self.descriptor.id,
            format!(
                "threat {} ({:.1}), auth required: {}",
                assessment.threat_level, assessment.threat_score, assessment.requires_auth
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
        let assessment: SecurityAnalysis = analysis.payload_as()?;
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
        let Ok(a) = analysis.payload_as::<SecurityAnalysis>() else {
            return false;
        };
        match criterion.condition.as_str() {
            HIGH_THREAT_SURFACE => a.threat_level >= ThreatLevel::High,
            AUTHENTICATION_REQUIRED => a.requires_auth,
            CRITICAL_THREAT => a.threat_level == ThreatLevel::Critical,
            _ => false,
        }
    }

    fn max_complexity_handled(&self) -> f64 {
        match self.descriptor.tier {
            Tier::Tier1 => 3.0,
            Tier::Tier2 => 9.0,
            Tier::Tier3 => 20.0,
        }
    }
}
