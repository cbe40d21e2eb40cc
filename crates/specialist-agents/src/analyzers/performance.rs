//! Performance specialists: load, latency and capacity.

use super::{confidence_for, keyword_regex, matches, PERFORMANCE};
use async_trait::async_trait;
use coordination::{
    Analysis, Context, HandoffCriterion, Recommendation, Specialist, SpecialistDescriptor,
    SpecialistError, Task, Tier, Timeline,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const HIGH_LOAD: &str = "high-load";
pub const ULTRA_LOW_LATENCY: &str = "ultra-low-latency";
pub const PLANET_SCALE: &str = "planet-scale-capacity";

/// Requests per instance assumed by the capacity plan.
const RPS_PER_INSTANCE: f64 = 2_000.0;

static LOAD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million)?\s*(?:rps|qps|tps|req/s|requests per second|queries per second|transactions per second|concurrent users|users)\b",
    )
    .expect("load pattern should compile")
});

static LATENCY_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&["real-time", "low latency", "low-latency", "p99", "p95", "latency", "sub-second"])
        .expect("latency keywords should compile")
});

static ULTRA_LOW_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "sub-millisecond",
        "microsecond",
        "microseconds",
        "nanosecond",
        "hft",
        "high-frequency trading",
    ])
    .expect("ultra-low latency keywords should compile")
});

static BOTTLENECK_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "database",
        "lock",
        "locks",
        "contention",
        "garbage collection",
        "serialization",
        "cache miss",
        "disk",
        "network",
        "cpu",
        "memory",
    ])
    .expect("bottleneck keywords should compile")
});

/// Largest load figure mentioned in `text`, in requests per second.
fn expected_rps(text: &str) -> f64 {
    LOAD_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let base: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
            let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()).as_deref() {
                Some("k") | Some("thousand") => 1_000.0,
                Some("m") | Some("million") => 1_000_000.0,
                _ => 1.0,
            };
            // JSON has no infinity; overlong figures saturate.
            Some((base * multiplier).min(f64::MAX))
        })
        .fold(0.0, f64::max)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub expected_rps: f64,
    pub latency_sensitive: bool,
    pub ultra_low_latency: bool,
    pub bottlenecks: Vec<String>,
    /// 0–10
    pub load_score: f64,
}

impl PerformanceAnalysis {
    /// Context hint: `expected_rps` (number) wins when larger than the
    /// figure found in the description.
    pub fn assess(task: &Task, context: &Context) -> Self {
        let text = &task.description;
        let rps = expected_rps(text).max(context.get_f64("expected_rps").unwrap_or(0.0));
        let ultra_low_latency = ULTRA_LOW_KEYWORDS.is_match(text);
        let latency_sensitive = ultra_low_latency || LATENCY_KEYWORDS.is_match(text);
        let bottlenecks = matches(&BOTTLENECK_KEYWORDS, text);

        let mut score = (rps + 1.0).log10() * 1.5 + 0.5 * bottlenecks.len() as f64;
        if latency_sensitive {
            score += 1.5;
        }
        if ultra_low_latency {
            score += 3.0;
        }
        let load_score = (score.min(10.0) * 10.0).round() / 10.0;

        Self {
            expected_rps: rps,
            latency_sensitive,
            ultra_low_latency,
            bottlenecks: bottlenecks.into_iter().collect(),
            load_score,
        }
    }

    pub fn instances_needed(&self) -> u64 {
        (self.expected_rps / RPS_PER_INSTANCE).ceil().max(1.0) as u64
    }
}

pub struct PerformanceSpecialist {
    descriptor: SpecialistDescriptor,
}

impl PerformanceSpecialist {
    pub fn for_tier(tier: Tier) -> Self {
        let descriptor = match tier {
            Tier::Tier1 => SpecialistDescriptor::new(
                "perf-1",
                "Performance Generalist",
                PERFORMANCE,
                Tier::Tier1,
            )
            .with_expertise(["profiling", "caching", "query tuning"])
            .with_handoff(HandoffCriterion::new(
                HIGH_LOAD,
                "sustained load of 10k rps, or 1k rps with latency targets",
                Tier::Tier2,
                "perf-2",
            ))
            .with_handoff(HandoffCriterion::new(
                ULTRA_LOW_LATENCY,
                "sub-millisecond latency budget",
                Tier::Tier3,
                "perf-3",
            )),
            Tier::Tier2 => SpecialistDescriptor::new(
                "perf-2",
                "Performance Engineer",
                PERFORMANCE,
                Tier::Tier2,
            )
            .with_expertise(["load testing", "capacity planning", "latency budgets"])
            .with_prerequisite(Tier::Tier1)
            .with_handoff(HandoffCriterion::new(
                PLANET_SCALE,
                "a million rps needs a dedicated capacity architecture",
                Tier::Tier3,
                "perf-3",
            )),
            Tier::Tier3 => SpecialistDescriptor::new(
                "perf-3",
                "Performance Architect",
                PERFORMANCE,
                Tier::Tier3,
            )
            .with_expertise(["sharding", "kernel bypass", "global traffic management"])
            .with_prerequisite(Tier::Tier2),
        };
        Self { descriptor }
    }

    fn recommend(&self, a: &PerformanceAnalysis) -> (String, serde_json::Value, Vec<String>, Timeline) {
        let ceiling = self.max_complexity_handled();
        match self.descriptor.tier {
            Tier::Tier1 => (
                "Profile first, then cache hot reads and fix the top bottleneck".to_string(),
                serde_json::json!({
                    "focus": a.bottlenecks,
                    "expected_rps": a.expected_rps,
                }),
                vec!["baseline benchmark".into(), "profiling run".into()],
                Timeline::weeks(1.0, 3.0, confidence_for(0.8, a.load_score, ceiling)),
            ),
            Tier::Tier2 => (
                format!(
                    "Plan for {} instances at {:.0} rps with a p99 budget",
                    a.instances_needed(),
                    a.expected_rps
                ),
                serde_json::json!({
                    "instances": a.instances_needed(),
                    "rps_per_instance": RPS_PER_INSTANCE,
                    "latency_sensitive": a.latency_sensitive,
                }),
                vec!["load test at 2x peak".into(), "p99 latency budget".into()],
                Timeline::weeks(3.0, 6.0, confidence_for(0.8, a.load_score, ceiling)),
            ),
            Tier::Tier3 => {
                let mut techniques = vec!["data sharding", "regional traffic steering"];
                if a.ultra_low_latency {
                    techniques.push("kernel-bypass networking");
                    techniques.push("lock-free hot path");
                }
                (
                    "Design a capacity architecture for the target envelope".to_string(),
                    serde_json::json!({ "techniques": techniques }),
                    vec!["capacity model review".into(), "latency SLO sign-off".into()],
                    Timeline::weeks(8.0, 14.0, confidence_for(0.85, a.load_score, ceiling)),
                )
            }
        }
    }
}

#[async_trait]
impl Specialist for PerformanceSpecialist {
    fn descriptor(&self) -> &SpecialistDescriptor {
        &self.descriptor
    }

    async fn analyze(&self, task: &Task, context: &Context) -> Result<Analysis, SpecialistError> {
        let assessment = PerformanceAnalysis::assess(task, context);
        Analysis::from_payload(
            &self.descriptor.id,
            format!(
                "{:.0} rps expected, load score {:.1}, latency sensitive: {}",
                assessment.expected_rps, assessment.load_score, assessment.latency_sensitive
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
        let assessment: PerformanceAnalysis = analysis.payload_as()?;
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
        let Ok(a) = analysis.payload_as::<PerformanceAnalysis>() else {
            return false;
        };
        match criterion.condition.as_str() {
            HIGH_LOAD => {
                a.expected_rps >= 10_000.0 || (a.latency_sensitive && a.expected_rps >= 1_000.0)
            }
            ULTRA_LOW_LATENCY => a.ultra_low_latency,
            PLANET_SCALE => a.expected_rps >= 1_000_000.0,
            _ => false,
        }
    }

    fn max_complexity_handled(&self) -> f64 {
        match self.descriptor.tier {
            Tier::Tier1 => 4.0,
            Tier::Tier2 => 7.5,
            Tier::Tier3 => 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_rps_parsing() {
        assert_eq!(expected_rps("handle 10,000 rps at peak"), 10_000.0);
        assert_eq!(expected_rps("about 2.5k req/s, bursts of 40k RPS"), 40_000.0);
        assert_eq!(expected_rps("3 million concurrent users"), 3_000_000.0);
        assert_eq!(expected_rps("no numbers here"), 0.0);
    }

    #[test]
    fn test_context_rps_hint() {
        let context = Context::new().with("expected_rps", 50_000);
        let a = PerformanceAnalysis::assess(&Task::new("t", "speed up checkout"), &context);
        assert_eq!(a.expected_rps, 50_000.0);
        assert_eq!(a.instances_needed(), 25);
    }

    #[test]
    fn test_ultra_low_latency_implies_latency_sensitive() {
        let a = PerformanceAnalysis::assess(
            &Task::new("t", "sub-millisecond order matching engine"),
            &Context::new(),
        );
        assert!(a.ultra_low_latency);
        assert!(a.latency_sensitive);
    }

    #[tokio::test]
    async fn test_overlong_load_figure_still_escalates() {
        let specialist = PerformanceSpecialist::for_tier(Tier::Tier1);
        let task = Task::new("t", &format!("ingest {} rps", "9".repeat(400)));
        let analysis = specialist.analyze(&task, &Context::new()).await.unwrap();
        let payload: PerformanceAnalysis = analysis.payload_as().unwrap();
        assert!(payload.expected_rps.is_finite());
        assert_eq!(payload.expected_rps, f64::MAX);

        let recommendation = specialist
            .generate_recommendations(&analysis, &task, &Context::new())
            .await
            .unwrap();
        assert!(!recommendation.quality_checks.is_empty());
        let criteria = &specialist.descriptor().handoff_criteria;
        assert!(specialist.evaluate_handoff_criterion(&criteria[0], &analysis, &task));
    }

    #[tokio::test]
    async fn test_latency_sensitive_thousand_rps_is_high_load() {
        let specialist = PerformanceSpecialist::for_tier(Tier::Tier1);
        let task = Task::new("t", "real-time dashboard serving 2000 rps");
        let analysis = specialist.analyze(&task, &Context::new()).await.unwrap();
        let criteria = &specialist.descriptor().handoff_criteria;
        assert!(specialist.evaluate_handoff_criterion(&criteria[0], &analysis, &task));
        assert!(!specialist.evaluate_handoff_criterion(&criteria[1], &analysis, &task));
    }
}
