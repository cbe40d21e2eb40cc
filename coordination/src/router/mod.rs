//! Domain Router: the injected `domain_of(task)` seam
//!
//! The engine never classifies tasks itself. Callers supply a
//! [`DomainClassifier`]; any `Fn(&Task) -> Domain` closure qualifies, so tests
//! and integrators can route with a single line:
//!
//! ```rust,ignore
//! let engine = EscalationEngine::new(registry, |_: &Task| Domain::new("security"));
//! ```

use crate::specialist::Domain;
use crate::task::Task;

/// Initial routing: which domain's entry-tier specialist receives the task.
#[cfg_attr(test, mockall::automock)]
pub trait DomainClassifier: Send + Sync {
    fn domain_of(&self, task: &Task) -> Domain;
}

impl<F> DomainClassifier for F
where
    F: Fn(&Task) -> Domain + Send + Sync,
{
    fn domain_of(&self, task: &Task) -> Domain {
        self(task)
    }
}

/// Routes every task to one fixed domain.
#[derive(Debug, Clone)]
pub struct FixedDomain(pub Domain);

impl DomainClassifier for FixedDomain {
    fn domain_of(&self, _task: &Task) -> Domain {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_classifier() {
        let classifier = |task: &Task| {
            if task.description.contains("token") {
                Domain::new("security")
            } else {
                Domain::new("architecture")
            }
        };
        let task = Task::new("t", "rotate the signing token");
        assert_eq!(classifier.domain_of(&task), Domain::new("security"));
    }

    #[test]
    fn test_fixed_domain() {
        let classifier = FixedDomain(Domain::new("performance"));
        assert_eq!(
            classifier.domain_of(&Task::new("t", "anything")),
            Domain::new("performance")
        );
    }

    #[test]
    fn test_mock_classifier() {
        let mut mock = MockDomainClassifier::new();
        mock.expect_domain_of()
            .times(1)
            .returning(|_| Domain::new("data"));
        assert_eq!(mock.domain_of(&Task::new("t", "x")), Domain::new("data"));
    }
}
