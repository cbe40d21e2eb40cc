//! Engine configuration: stage timeouts and the consultation bound.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ANALYZE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RECOMMEND_TIMEOUT_SECS: u64 = 30;

/// Tunables for the [`EscalationEngine`](crate::escalation::EscalationEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to each `analyze` call, in milliseconds
    pub analyze_timeout_ms: u64,
    /// Timeout applied to each `generate_recommendations` call, in milliseconds
    pub recommend_timeout_ms: u64,
    /// Optional cap on consultations per request. The registry's tier count
    /// always applies as well; the smaller bound wins.
    pub max_consultations: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyze_timeout_ms: DEFAULT_ANALYZE_TIMEOUT_SECS * 1000,
            recommend_timeout_ms: DEFAULT_RECOMMEND_TIMEOUT_SECS * 1000,
            max_consultations: None,
        }
    }
}

fn positive_from_env(var: &str) -> Option<u64> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}

fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}

impl EngineConfig {
    /// Defaults overridden by `SPECIALIST_ANALYZE_TIMEOUT_SECS`,
    /// `SPECIALIST_RECOMMEND_TIMEOUT_SECS` and `SPECIALIST_MAX_CONSULTATIONS`.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(secs) = positive_from_env("SPECIALIST_ANALYZE_TIMEOUT_SECS") {
            self.analyze_timeout_ms = secs_to_ms(secs);
        }
        if let Some(secs) = positive_from_env("SPECIALIST_RECOMMEND_TIMEOUT_SECS") {
            self.recommend_timeout_ms = secs_to_ms(secs);
        }
        if let Some(max) = positive_from_env("SPECIALIST_MAX_CONSULTATIONS") {
            self.max_consultations = Some(max as usize);
        }
        self
    }

    /// Same timeout for both stages.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        self.analyze_timeout_ms = ms;
        self.recommend_timeout_ms = ms;
        self
    }

    pub fn analyze_timeout(&self) -> Duration {
        Duration::from_millis(self.analyze_timeout_ms)
    }

    pub fn recommend_timeout(&self) -> Duration {
        Duration::from_millis(self.recommend_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.analyze_timeout(), Duration::from_secs(30));
        assert_eq!(config.recommend_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_consultations, None);
    }

    #[test]
    fn test_stage_timeout_builder() {
        let config = EngineConfig::default().with_stage_timeout(Duration::from_millis(250));
        assert_eq!(config.analyze_timeout_ms, 250);
        assert_eq!(config.recommend_timeout_ms, 250);
    }

    #[test]
    fn test_huge_timeout_saturates() {
        assert_eq!(secs_to_ms(45), 45_000);
        assert_eq!(secs_to_ms(u64::MAX), u64::MAX);
        assert_eq!(secs_to_ms(u64::MAX / 1000 + 1), u64::MAX);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_consultations": 2}"#).unwrap();
        assert_eq!(config.max_consultations, Some(2));
        assert_eq!(config.analyze_timeout_ms, 30_000);
    }
}
