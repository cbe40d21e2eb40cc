//! Reference specialists for three domains, one per tier.
//!
//! Every analyzer is a deterministic keyword heuristic over the task
//! description plus optional context hints. Scores are domain-local: an
//! architecture complexity of 8 says nothing about a security threat score
//! of 8.
//!
//! | Domain         | TIER_1                 | TIER_2                          | TIER_3                |
//! |----------------|------------------------|---------------------------------|-----------------------|
//! | architecture   | `arch-1` generalist    | `arch-2` solutions architect    | `arch-3` enterprise   |
//! | security       | `sec-1` generalist     | `sec-2` application security    | `sec-3` architect     |
//! | performance    | `perf-1` generalist    | `perf-2` performance engineer   | `perf-3` architect    |

pub mod architecture;
pub mod performance;
pub mod security;

pub use architecture::{ArchitectureAnalysis, ArchitectureSpecialist};
pub use performance::{PerformanceAnalysis, PerformanceSpecialist};
pub use security::{SecurityAnalysis, SecuritySpecialist, ThreatLevel};

use coordination::{ConfigError, SpecialistRegistry, Tier};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

pub const ARCHITECTURE: &str = "architecture";
pub const SECURITY: &str = "security";
pub const PERFORMANCE: &str = "performance";

/// Case-insensitive whole-word alternation over `words`.
pub(crate) fn keyword_regex(words: &[&str]) -> Result<Regex, regex::Error> {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
        .case_insensitive(true)
        .build()
}

/// Distinct matches, lowercased and sorted.
pub(crate) fn matches(re: &Regex, text: &str) -> BTreeSet<String> {
    re.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Confidence falls off once a score exceeds what the tier is meant to handle.
pub(crate) fn confidence_for(base: f64, score: f64, ceiling: f64) -> f64 {
    if score > ceiling {
        (base - 0.25).max(0.1)
    } else {
        base
    }
}

/// Registry with all nine reference specialists wired together.
pub fn default_registry() -> Result<SpecialistRegistry, ConfigError> {
    let mut builder = SpecialistRegistry::builder();
    for tier in Tier::ALL {
        builder = builder
            .register(ArchitectureSpecialist::for_tier(tier))
            .register(SecuritySpecialist::for_tier(tier))
            .register(PerformanceSpecialist::for_tier(tier));
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_regex_is_whole_word() {
        let re = keyword_regex(&["api", "single sign-on"]).unwrap();
        assert!(re.is_match("Expose a public API"));
        assert!(re.is_match("add Single Sign-On"));
        assert!(!re.is_match("rapid prototyping"));
    }

    #[test]
    fn test_matches_are_distinct() {
        let re = keyword_regex(&["queue", "cache"]).unwrap();
        let found = matches(&re, "Queue then cache, then another queue");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["cache", "queue"]);
    }

    #[test]
    fn test_default_registry_is_valid() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.tier_count(), 3);
        let domains: Vec<String> = registry.domains().iter().map(|d| d.to_string()).collect();
        assert_eq!(domains, vec![ARCHITECTURE, PERFORMANCE, SECURITY]);
    }
}
