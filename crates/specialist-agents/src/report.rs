//! Human-readable rendering of results and registry listings.

use coordination::{ConsolidatedResult, SpecialistRegistry};
use std::fmt::Write;

pub fn render_result(result: &ConsolidatedResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "request   {}", result.request_id);
    let _ = writeln!(out, "task      {} ({})", result.task_id, result.domain);
    let _ = writeln!(out, "outcome   {}", result.termination);
    let _ = writeln!(out, "confidence {:.2}", result.overall_confidence);

    let _ = writeln!(out, "\nchain:");
    for record in &result.chain {
        let _ = write!(
            out,
            "  {} {:<8} {:<32} {:?}",
            record.tier,
            record.specialist_id.as_str(),
            record.specialist_name,
            record.status
        );
        if let Some(target) = &record.prerequisite_for {
            let _ = write!(out, " [prerequisite for {}]", target);
        }
        let _ = writeln!(out);
        if let Some(analysis) = &record.analysis {
            let _ = writeln!(out, "      analysis: {}", analysis.summary);
        }
        if let Some(failure) = &record.failure {
            let _ = writeln!(out, "      failure:  {}", failure);
        }
    }

    if !result.handoff_trail.is_empty() {
        let _ = writeln!(out, "\nhandoffs:");
        for step in &result.handoff_trail {
            let _ = writeln!(
                out,
                "  {} -> {} ({})",
                step.from, step.to, step.reason
            );
        }
    }

    if let Some(rec) = &result.final_recommendation {
        let _ = writeln!(out, "\nrecommendation ({}): {}", rec.produced_by, rec.summary);
    }
    if let Some(timeline) = &result.overall_timeline {
        let _ = writeln!(out, "timeline: {}", timeline.final_estimate.timeline);
    }
    if !result.quality_checks.is_empty() {
        let _ = writeln!(out, "\nquality checks:");
        for check in &result.quality_checks {
            let _ = writeln!(out, "  - {}", check);
        }
    }
    out
}

pub fn render_registry(registry: &SpecialistRegistry) -> String {
    let mut out = String::new();
    for descriptor in registry.descriptors() {
        let status = match registry.available(&descriptor.id) {
            Ok(_) => "available".to_string(),
            Err(e) => e.to_string(),
        };
        let _ = writeln!(
            out,
            "{:<14} {} {:<8} {:<32} {}",
            descriptor.domain.as_str(),
            descriptor.tier,
            descriptor.id.as_str(),
            descriptor.name,
            status
        );
        for criterion in &descriptor.handoff_criteria {
            let _ = writeln!(
                out,
                "    {} -> {} {}",
                criterion.condition, criterion.target_tier, criterion.target_specialist_id
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::default_registry;
    use coordination::SpecialistId;

    #[test]
    fn test_render_registry_lists_all_specialists() {
        let mut registry = default_registry().unwrap();
        registry.mark_unavailable(&SpecialistId::new("perf-3"), "offline");
        let text = render_registry(&registry);

        assert_eq!(text.lines().filter(|l| !l.starts_with(' ')).count(), 9);
        assert!(text.contains("enterprise-scale-system -> TIER_2 arch-2"));
        assert!(text.contains("specialist 'perf-3' is unavailable: offline"));
    }
}
