//! Reference collaborators for the specialist escalation engine.
//!
//! - [`analyzers`]: architecture, security and performance specialists, three
//!   tiers each, and [`analyzers::default_registry`]
//! - [`classifier`]: keyword-based `domain_of`
//! - [`config`]: TOML + environment application config
//! - [`audit`]: JSON-lines audit log of consolidated results
//! - [`report`]: text rendering for the CLI

pub mod analyzers;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod report;

pub use analyzers::default_registry;
pub use audit::{AuditEntry, AuditError, JsonlAuditLog};
pub use classifier::{KeywordDomainClassifier, DOMAIN_ATTRIBUTE};
pub use config::{AppConfig, AppConfigError, LogFormat};
