//! Keyword-based domain routing.
//!
//! An explicit `domain` attribute on the task always wins. Otherwise each
//! domain's keyword table is scored against the description; the domain with
//! the most distinct hits wins, ties going to the earlier rule. No hits falls
//! back to the configured default.

use crate::analyzers::{keyword_regex, matches, ARCHITECTURE, PERFORMANCE, SECURITY};
use coordination::{Domain, DomainClassifier, Task};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Task attribute that pins the domain.
pub const DOMAIN_ATTRIBUTE: &str = "domain";

static SECURITY_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "security",
        "secure",
        "auth",
        "authentication",
        "authorization",
        "login",
        "password",
        "encryption",
        "vulnerability",
        "threat",
        "oauth",
        "sso",
        "xss",
        "csrf",
        "injection",
        "compliance",
        "secrets",
        "token",
    ])
    .expect("security routing keywords should compile")
});

static PERFORMANCE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "performance",
        "latency",
        "throughput",
        "slow",
        "optimize",
        "optimise",
        "load",
        "rps",
        "qps",
        "benchmark",
        "profiling",
        "sub-millisecond",
        "capacity",
        "memory usage",
    ])
    .expect("performance routing keywords should compile")
});

static ARCHITECTURE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    keyword_regex(&[
        "architecture",
        "microservices",
        "design",
        "system",
        "platform",
        "integration",
        "integrating",
        "distributed",
        "monolith",
        "service",
        "services",
        "modules",
    ])
    .expect("architecture routing keywords should compile")
});

#[derive(Debug, Clone)]
struct Rule {
    domain: Domain,
    keywords: Regex,
}

#[derive(Debug, Clone)]
pub struct KeywordDomainClassifier {
    rules: Vec<Rule>,
    default_domain: Domain,
}

impl KeywordDomainClassifier {
    /// Security, performance and architecture tables, in that priority order.
    pub fn new(default_domain: impl AsRef<str>) -> Self {
        Self {
            rules: vec![
                Rule {
                    domain: Domain::new(SECURITY),
                    keywords: SECURITY_KEYWORDS.clone(),
                },
                Rule {
                    domain: Domain::new(PERFORMANCE),
                    keywords: PERFORMANCE_KEYWORDS.clone(),
                },
                Rule {
                    domain: Domain::new(ARCHITECTURE),
                    keywords: ARCHITECTURE_KEYWORDS.clone(),
                },
            ],
            default_domain: Domain::new(default_domain),
        }
    }

    /// Add a rule after the built-in ones.
    pub fn with_rule(mut self, domain: impl AsRef<str>, keywords: &[&str]) -> Result<Self, regex::Error> {
        self.rules.push(Rule {
            domain: Domain::new(domain),
            keywords: keyword_regex(keywords)?,
        });
        Ok(self)
    }

    pub fn default_domain(&self) -> &Domain {
        &self.default_domain
    }
}

impl DomainClassifier for KeywordDomainClassifier {
    fn domain_of(&self, task: &Task) -> Domain {
        if let Some(pinned) = task.attribute(DOMAIN_ATTRIBUTE).and_then(|v| v.as_str()) {
            return Domain::new(pinned);
        }

        let mut best: Option<(&Domain, usize)> = None;
        for rule in &self.rules {
            let hits = matches(&rule.keywords, &task.description).len();
            if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
                best = Some((&rule.domain, hits));
            }
        }

        let domain = best
            .map(|(domain, _)| domain.clone())
            .unwrap_or_else(|| self.default_domain.clone());
        debug!(task_id = %task.id, %domain, "Classified task");
        domain
    }
}
