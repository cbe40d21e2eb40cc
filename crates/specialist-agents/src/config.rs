//! Application configuration: TOML file plus environment overrides.
//!
//! ```toml
//! default_domain = "architecture"
//! audit_log = "/var/log/specialists/audit.jsonl"
//! log_format = "json"
//!
//! [engine]
//! analyze_timeout_ms = 10000
//! recommend_timeout_ms = 10000
//! max_consultations = 3
//!
//! [[disabled]]
//! id = "perf-3"
//! reason = "capacity review board on leave"
//! ```
//!
//! Environment: `SPECIALIST_CONFIG` (file path), `SPECIALIST_AUDIT_LOG`,
//! `SPECIALIST_DEFAULT_DOMAIN`, plus the engine's own timeout variables.

use crate::analyzers::{self, ARCHITECTURE};
use crate::classifier::KeywordDomainClassifier;
use coordination::{ConfigError, EngineConfig, EscalationEngine, SpecialistId, SpecialistRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const CONFIG_ENV: &str = "SPECIALIST_CONFIG";
pub const AUDIT_LOG_ENV: &str = "SPECIALIST_AUDIT_LOG";
pub const DEFAULT_DOMAIN_ENV: &str = "SPECIALIST_DEFAULT_DOMAIN";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A specialist withdrawn from service at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledSpecialist {
    pub id: String,
    #[serde(default = "default_disabled_reason")]
    pub reason: String,
}

fn default_disabled_reason() -> String {
    "disabled by configuration".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Domain used when no routing keyword matches
    pub default_domain: String,
    /// JSONL audit log; disabled when unset
    pub audit_log: Option<PathBuf>,
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    pub disabled: Vec<DisabledSpecialist>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_domain: ARCHITECTURE.to_string(),
            audit_log: None,
            log_format: LogFormat::Text,
            engine: EngineConfig::default(),
            disabled: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, else from `SPECIALIST_CONFIG`, else defaults; then
    /// apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, AppConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| AppConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| AppConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(AUDIT_LOG_ENV).filter(|v| !v.trim().is_empty()) {
            self.audit_log = Some(PathBuf::from(path));
        }
        if let Some(domain) = lookup(DEFAULT_DOMAIN_ENV).filter(|v| !v.trim().is_empty()) {
            self.default_domain = domain.trim().to_string();
        }
        self.engine = self.engine.with_env_overrides();
        self
    }

    pub fn validate(&self) -> Result<(), AppConfigError> {
        if self.default_domain.trim().is_empty() {
            return Err(AppConfigError::Invalid("default_domain must not be empty".into()));
        }
        if self.engine.analyze_timeout_ms == 0 || self.engine.recommend_timeout_ms == 0 {
            return Err(AppConfigError::Invalid("stage timeouts must be positive".into()));
        }
        if self.engine.max_consultations == Some(0) {
            return Err(AppConfigError::Invalid("max_consultations must be at least 1".into()));
        }
        Ok(())
    }

    /// The reference registry with configured withdrawals applied.
    pub fn build_registry(&self) -> Result<SpecialistRegistry, ConfigError> {
        let mut registry = analyzers::default_registry()?;
        for disabled in &self.disabled {
            let id = SpecialistId::new(disabled.id.as_str());
            if !registry.mark_unavailable(&id, disabled.reason.as_str()) {
                warn!(specialist = %id, "Ignoring unknown specialist in disabled list");
            }
        }
        Ok(registry)
    }

    pub fn build_engine(&self) -> Result<EscalationEngine<KeywordDomainClassifier>, ConfigError> {
        Ok(EscalationEngine::with_config(
            self.build_registry()?,
            KeywordDomainClassifier::new(&self.default_domain),
            self.engine.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
default_domain = "security"
audit_log = "audit.jsonl"
log_format = "json"

[engine]
analyze_timeout_ms = 5000
max_consultations = 2

[[disabled]]
id = "sec-3"
reason = "on call rotation"

[[disabled]]
id = "perf-2"
"#;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_domain, "security");
        assert_eq!(config.audit_log, Some(PathBuf::from("audit.jsonl")));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.engine.analyze_timeout_ms, 5000);
        assert_eq!(config.engine.recommend_timeout_ms, 30_000);
        assert_eq!(config.engine.max_consultations, Some(2));
        assert_eq!(config.disabled.len(), 2);
        assert_eq!(config.disabled[1].reason, "disabled by configuration");
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"default_domain = [").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, AppConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, AppConfigError::Read { .. }));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default().with_overrides(|key| match key {
            AUDIT_LOG_ENV => Some("/tmp/audit.jsonl".to_string()),
            DEFAULT_DOMAIN_ENV => Some(" performance ".to_string()),
            _ => None,
        });
        assert_eq!(config.audit_log, Some(PathBuf::from("/tmp/audit.jsonl")));
        assert_eq!(config.default_domain, "performance");
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = AppConfig::default();
        config.engine.max_consultations = Some(0);
        assert!(matches!(config.validate(), Err(AppConfigError::Invalid(_))));
    }

    #[test]
    fn test_build_registry_applies_withdrawals() {
        let config = AppConfig {
            disabled: vec![
                DisabledSpecialist {
                    id: "sec-2".into(),
                    reason: "maintenance".into(),
                },
                DisabledSpecialist {
                    id: "nobody".into(),
                    reason: "typo".into(),
                },
            ],
            ..AppConfig::default()
        };
        let registry = config.build_registry().unwrap();
        assert!(registry.available(&SpecialistId::new("sec-2")).is_err());
        assert!(registry.available(&SpecialistId::new("sec-1")).is_ok());
    }
}
